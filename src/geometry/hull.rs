//! Representation and construction of convex polyhedra.

use crate::{
    fph,
    inertia::point_mass_inertia_matrix,
    math::{self, Direction, Position, PRECISION},
    transform::ReferenceFrame,
};
use nalgebra::{Matrix3, Point3, Vector3, point, vector};
use rustc_hash::FxHashMap;
use std::f64::consts::PI;
use thiserror::Error;

/// Error produced when convex geometry cannot be constructed from the given
/// input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HullError {
    /// The input does not describe a closed convex polyhedron with positive
    /// volume.
    #[error("degenerate convex geometry: {0}")]
    DegenerateGeometry(&'static str),
}

/// A planar polygonal face of a convex polyhedron.
///
/// The vertices are ordered counterclockwise as seen from outside the
/// polyhedron, so that `normalize(cross(v3 - v2, v1 - v2))` for any three
/// consecutive vertices reproduces the outward unit normal.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    vertices: Vec<Position>,
    normal: Direction,
}

/// A convex polyhedron with precomputed mass properties and deduplicated
/// edge and normal directions for separating-axis tests.
///
/// The volume and inertia tensor assume uniform unit density; the inertia
/// tensor is defined about the center of mass.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvexHull {
    faces: Vec<Face>,
    vertices: Vec<Position>,
    unique_edges: Vec<Direction>,
    unique_normals: Vec<Direction>,
    center_of_mass: Position,
    volume: fph,
    inertia: Matrix3<fph>,
}

impl Face {
    fn new(vertices: Vec<Position>, normal: Direction) -> Self {
        Self { vertices, normal }
    }

    /// Returns the vertices of the face, in counterclockwise order as seen
    /// from outside.
    pub fn vertices(&self) -> &[Position] {
        &self.vertices
    }

    /// Returns the outward unit normal of the face.
    pub fn normal(&self) -> &Direction {
        &self.normal
    }

    /// Computes the signed distance from the face plane to the given point,
    /// positive outside the polyhedron.
    pub fn compute_signed_distance(&self, point: &Position) -> fph {
        self.normal.dot(&(point - self.vertices[0]))
    }

    /// Whether the given point, assumed to lie in the face plane, falls
    /// within the polygonal contour of the face.
    pub fn contains_point_in_plane(&self, point: &Position) -> bool {
        let n_vertices = self.vertices.len();
        for idx in 0..n_vertices {
            let start = &self.vertices[idx];
            let end = &self.vertices[(idx + 1) % n_vertices];
            let edge = end - start;
            let to_point = point - start;
            if edge.cross(&to_point).dot(&self.normal) < -PRECISION {
                return false;
            }
        }
        true
    }

    fn transformed(&self, frame: &ReferenceFrame) -> Self {
        Self::new(
            self.vertices
                .iter()
                .map(|vertex| frame.transform_point(vertex))
                .collect(),
            Direction::new_unchecked(frame.transform_vector(&self.normal)),
        )
    }
}

impl ConvexHull {
    /// Builds a convex hull from a closed triangle mesh, merging coplanar
    /// neighboring triangles into polygonal faces. Triangles are given as
    /// index triples into the vertex slice, wound counterclockwise as seen
    /// from outside.
    ///
    /// Neighboring triangles whose normals differ by less than the default
    /// [`PRECISION`] are merged; use
    /// [`Self::from_triangle_mesh_with_merge_epsilon`] to tune this for
    /// coarse meshes.
    pub fn from_triangle_mesh(
        vertices: &[Position],
        triangles: &[[usize; 3]],
    ) -> Result<Self, HullError> {
        Self::from_triangle_mesh_with_merge_epsilon(vertices, triangles, PRECISION)
    }

    /// Builds a convex hull from a closed triangle mesh, merging neighboring
    /// triangles whose normals differ by less than the given epsilon.
    pub fn from_triangle_mesh_with_merge_epsilon(
        vertices: &[Position],
        triangles: &[[usize; 3]],
        merge_epsilon: fph,
    ) -> Result<Self, HullError> {
        if triangles.len() < 4 {
            return Err(HullError::DegenerateGeometry(
                "fewer than four triangles cannot enclose a volume",
            ));
        }

        let triangle_normals = compute_triangle_normals(vertices, triangles)?;
        let triangle_for_directed_edge = map_directed_edges_to_triangles(triangles)?;

        let mut faces = Vec::new();
        let mut visited = vec![false; triangles.len()];

        for seed_idx in 0..triangles.len() {
            if visited[seed_idx] {
                continue;
            }
            visited[seed_idx] = true;

            let normal = triangle_normals[seed_idx];
            let mut contour = triangles[seed_idx].to_vec();

            // Grow the face by absorbing adjacent coplanar triangles until
            // none remain along the contour
            'grow: loop {
                for idx in 0..contour.len() {
                    let start = contour[idx];
                    let end = contour[(idx + 1) % contour.len()];
                    let neighbor_idx = triangle_for_directed_edge[&(end, start)];

                    if !visited[neighbor_idx]
                        && directions_almost_equal(
                            &normal,
                            &triangle_normals[neighbor_idx],
                            merge_epsilon,
                        )
                    {
                        let inserted = extend_contour(&triangles[neighbor_idx], &mut contour);
                        debug_assert!(inserted, "adjacent triangle must share a contour edge");
                        visited[neighbor_idx] = true;
                        continue 'grow;
                    }
                }
                break;
            }

            faces.push(Face::new(
                contour.into_iter().map(|idx| vertices[idx]).collect(),
                normal,
            ));
        }

        let hull_vertices = collect_face_vertices(&faces);
        let (volume, center_of_mass, inertia) = compute_mass_properties(&faces, &hull_vertices);

        if volume <= PRECISION {
            return Err(HullError::DegenerateGeometry("volume not exceeding zero"));
        }

        Ok(Self::assemble(
            faces,
            hull_vertices,
            volume,
            center_of_mass,
            inertia,
        ))
    }

    /// Builds the rectangular box with the given full extents along the x-,
    /// y- and z-axis, centered on the origin, with faces, volume and inertia
    /// produced directly from the analytic formulas.
    ///
    /// # Panics
    /// If any extent does not exceed zero.
    pub fn from_box(extent_x: fph, extent_y: fph, extent_z: fph) -> Self {
        assert!(
            extent_x > 0.0 && extent_y > 0.0 && extent_z > 0.0,
            "Tried creating box with extent not exceeding zero"
        );

        let hx = 0.5 * extent_x;
        let hy = 0.5 * extent_y;
        let hz = 0.5 * extent_z;

        let face = |vertices: [Position; 4], normal: Direction| Face::new(vertices.to_vec(), normal);

        let faces = vec![
            face(
                [
                    point![hx, -hy, -hz],
                    point![hx, hy, -hz],
                    point![hx, hy, hz],
                    point![hx, -hy, hz],
                ],
                Vector3::x_axis(),
            ),
            face(
                [
                    point![-hx, -hy, -hz],
                    point![-hx, -hy, hz],
                    point![-hx, hy, hz],
                    point![-hx, hy, -hz],
                ],
                -Vector3::x_axis(),
            ),
            face(
                [
                    point![-hx, hy, -hz],
                    point![-hx, hy, hz],
                    point![hx, hy, hz],
                    point![hx, hy, -hz],
                ],
                Vector3::y_axis(),
            ),
            face(
                [
                    point![-hx, -hy, -hz],
                    point![hx, -hy, -hz],
                    point![hx, -hy, hz],
                    point![-hx, -hy, hz],
                ],
                -Vector3::y_axis(),
            ),
            face(
                [
                    point![-hx, -hy, hz],
                    point![hx, -hy, hz],
                    point![hx, hy, hz],
                    point![-hx, hy, hz],
                ],
                Vector3::z_axis(),
            ),
            face(
                [
                    point![-hx, -hy, -hz],
                    point![-hx, hy, -hz],
                    point![hx, hy, -hz],
                    point![hx, -hy, -hz],
                ],
                -Vector3::z_axis(),
            ),
        ];

        let volume = extent_x * extent_y * extent_z;

        let inertia = Matrix3::from_diagonal(&vector![
            (volume / 12.0) * (extent_y.powi(2) + extent_z.powi(2)),
            (volume / 12.0) * (extent_x.powi(2) + extent_z.powi(2)),
            (volume / 12.0) * (extent_x.powi(2) + extent_y.powi(2))
        ]);

        let vertices = collect_face_vertices(&faces);

        Self::assemble(faces, vertices, volume, Position::origin(), inertia)
    }

    /// Builds a prism approximating a cylinder with the given radius and
    /// length, extruded along the z-axis and centered on the origin, using
    /// the given number of circumferential subdivisions. Volume and inertia
    /// are those of the smooth cylinder.
    ///
    /// # Panics
    /// If `subdivisions < 3` or the radius or length does not exceed zero.
    pub fn from_cylinder(subdivisions: usize, radius: fph, length: fph) -> Self {
        assert!(
            subdivisions >= 3,
            "Tried creating cylinder with fewer than three subdivisions"
        );
        assert!(
            radius > 0.0 && length > 0.0,
            "Tried creating cylinder with radius or length not exceeding zero"
        );

        let half_length = 0.5 * length;

        let ring_point = |idx: usize, z: fph| {
            let angle = 2.0 * PI * (idx as fph) / (subdivisions as fph);
            point![radius * angle.cos(), radius * angle.sin(), z]
        };

        let top_vertices: Vec<Position> = (0..subdivisions)
            .map(|idx| ring_point(idx, half_length))
            .collect();
        let bottom_vertices: Vec<Position> = (0..subdivisions)
            .map(|idx| ring_point(idx, -half_length))
            .collect();

        let mut faces = Vec::with_capacity(subdivisions + 2);

        faces.push(Face::new(top_vertices.clone(), Vector3::z_axis()));
        faces.push(Face::new(
            bottom_vertices.iter().rev().copied().collect(),
            -Vector3::z_axis(),
        ));

        for idx in 0..subdivisions {
            let next_idx = (idx + 1) % subdivisions;
            let outward = Direction::new_normalize(
                (top_vertices[idx].coords + top_vertices[next_idx].coords)
                    .component_mul(&vector![1.0, 1.0, 0.0]),
            );
            faces.push(Face::new(
                vec![
                    bottom_vertices[idx],
                    bottom_vertices[next_idx],
                    top_vertices[next_idx],
                    top_vertices[idx],
                ],
                outward,
            ));
        }

        let volume = PI * radius.powi(2) * length;
        let moment_of_inertia_z = 0.5 * volume * radius.powi(2);
        let moment_of_inertia_xy =
            (volume / 12.0) * (3.0 * radius.powi(2) + length.powi(2));
        let inertia = Matrix3::from_diagonal(&vector![
            moment_of_inertia_xy,
            moment_of_inertia_xy,
            moment_of_inertia_z
        ]);

        let vertices = collect_face_vertices(&faces);

        Self::assemble(faces, vertices, volume, Position::origin(), inertia)
    }

    fn assemble(
        faces: Vec<Face>,
        vertices: Vec<Position>,
        volume: fph,
        center_of_mass: Position,
        inertia: Matrix3<fph>,
    ) -> Self {
        let mut unique_edges = Vec::new();
        for face in &faces {
            let n_vertices = face.vertices.len();
            for idx in 0..n_vertices {
                let edge = face.vertices[(idx + 1) % n_vertices] - face.vertices[idx];
                if let Some(direction) = Direction::try_new(edge, PRECISION) {
                    add_unique_direction(&mut unique_edges, direction);
                }
            }
        }

        let mut unique_normals = Vec::new();
        for face in &faces {
            add_unique_direction(&mut unique_normals, face.normal);
        }

        Self {
            faces,
            vertices,
            unique_edges,
            unique_normals,
            center_of_mass,
            volume,
            inertia,
        }
    }

    /// Returns the faces of the hull.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Returns the deduplicated vertices of the hull.
    pub fn vertices(&self) -> &[Position] {
        &self.vertices
    }

    /// Returns the edge directions of the hull, with no two entries parallel
    /// or antiparallel.
    pub fn unique_edges(&self) -> &[Direction] {
        &self.unique_edges
    }

    /// Returns the face normal directions of the hull, with no two entries
    /// parallel or antiparallel.
    pub fn unique_normals(&self) -> &[Direction] {
        &self.unique_normals
    }

    /// Returns the center of mass of the hull.
    pub fn center_of_mass(&self) -> &Position {
        &self.center_of_mass
    }

    /// Returns the volume of the hull.
    pub fn volume(&self) -> fph {
        self.volume
    }

    /// Returns the inertia tensor of the hull for uniform unit density,
    /// defined about the center of mass.
    pub fn inertia_matrix(&self) -> &Matrix3<fph> {
        &self.inertia
    }

    /// Computes the hull obtained by transforming this hull with the given
    /// frame: all vertices, normals and edge directions follow the frame, the
    /// inertia tensor is conjugated with the rotation and the volume is
    /// unchanged.
    pub fn transformed(&self, frame: &ReferenceFrame) -> Self {
        let rotation_matrix = frame.orientation.to_rotation_matrix();
        Self {
            faces: self
                .faces
                .iter()
                .map(|face| face.transformed(frame))
                .collect(),
            vertices: self
                .vertices
                .iter()
                .map(|vertex| frame.transform_point(vertex))
                .collect(),
            unique_edges: self
                .unique_edges
                .iter()
                .map(|edge| Direction::new_unchecked(frame.transform_vector(edge)))
                .collect(),
            unique_normals: self
                .unique_normals
                .iter()
                .map(|normal| Direction::new_unchecked(frame.transform_vector(normal)))
                .collect(),
            center_of_mass: frame.transform_point(&self.center_of_mass),
            volume: self.volume,
            inertia: rotation_matrix * self.inertia * rotation_matrix.transpose(),
        }
    }

    /// Finds the point on the surface of the hull closest to the given point,
    /// along with whether the given point lies inside the hull.
    pub fn closest_surface_point(&self, point: &Position) -> (Position, bool) {
        let mut inside = true;
        let mut closest_interior: Option<(fph, Position)> = None;
        let mut closest_exterior: Option<(fph, Position)> = None;

        for face in &self.faces {
            let signed_distance = face.compute_signed_distance(point);
            let projection = point - face.normal.scale(signed_distance);

            if signed_distance > 0.0 {
                inside = false;
                if face.contains_point_in_plane(&projection) {
                    let squared_distance = signed_distance.powi(2);
                    if closest_exterior
                        .as_ref()
                        .is_none_or(|(best, _)| squared_distance < *best)
                    {
                        closest_exterior = Some((squared_distance, projection));
                    }
                }
            } else if face.contains_point_in_plane(&projection)
                && closest_interior
                    .as_ref()
                    .is_none_or(|(best, _)| signed_distance > *best)
            {
                closest_interior = Some((signed_distance, projection));
            }

            let n_vertices = face.vertices.len();
            for idx in 0..n_vertices {
                let start = face.vertices[idx];
                let end = face.vertices[(idx + 1) % n_vertices];
                let closest = closest_point_on_segment(&start, &end, point);
                let squared_distance = (point - closest).norm_squared();
                if closest_exterior
                    .as_ref()
                    .is_none_or(|(best, _)| squared_distance < *best)
                {
                    closest_exterior = Some((squared_distance, closest));
                }
            }
        }

        if inside {
            let (_, closest) = closest_interior
                .expect("point inside hull must project onto at least one face");
            (closest, true)
        } else {
            let (_, closest) =
                closest_exterior.expect("hull must have at least one face");
            (closest, false)
        }
    }
}

/// Given a triangle sharing exactly one edge with the contour, inserts the
/// triangle's remaining vertex between the two contour vertices of the shared
/// edge (wrapping around between the last and first contour vertex). Returns
/// whether a shared edge was found.
fn extend_contour(triangle: &[usize; 3], contour: &mut Vec<usize>) -> bool {
    let rotations = [
        [triangle[0], triangle[1], triangle[2]],
        [triangle[1], triangle[2], triangle[0]],
        [triangle[2], triangle[0], triangle[1]],
    ];

    let n_vertices = contour.len();
    for idx in 0..n_vertices {
        let start = contour[idx];
        let end = contour[(idx + 1) % n_vertices];
        for [edge_start, edge_end, opposite] in rotations {
            // The shared edge runs in the opposite direction in the
            // neighboring triangle
            if edge_start == end && edge_end == start {
                contour.insert(idx + 1, opposite);
                return true;
            }
        }
    }
    false
}

fn compute_triangle_normals(
    vertices: &[Position],
    triangles: &[[usize; 3]],
) -> Result<Vec<Direction>, HullError> {
    triangles
        .iter()
        .map(|&[i1, i2, i3]| {
            let (p1, p2, p3) = match (vertices.get(i1), vertices.get(i2), vertices.get(i3)) {
                (Some(p1), Some(p2), Some(p3)) => (p1, p2, p3),
                _ => {
                    return Err(HullError::DegenerateGeometry(
                        "triangle index out of range",
                    ));
                }
            };
            Direction::try_new((p2 - p1).cross(&(p3 - p1)), PRECISION)
                .ok_or(HullError::DegenerateGeometry("triangle with zero area"))
        })
        .collect()
}

fn map_directed_edges_to_triangles(
    triangles: &[[usize; 3]],
) -> Result<FxHashMap<(usize, usize), usize>, HullError> {
    let mut triangle_for_directed_edge = FxHashMap::default();

    for (triangle_idx, &[i1, i2, i3]) in triangles.iter().enumerate() {
        for edge in [(i1, i2), (i2, i3), (i3, i1)] {
            if triangle_for_directed_edge.insert(edge, triangle_idx).is_some() {
                return Err(HullError::DegenerateGeometry(
                    "directed edge shared by multiple triangles",
                ));
            }
        }
    }

    for &(start, end) in triangle_for_directed_edge.keys() {
        if !triangle_for_directed_edge.contains_key(&(end, start)) {
            return Err(HullError::DegenerateGeometry("surface is not closed"));
        }
    }

    Ok(triangle_for_directed_edge)
}

fn collect_face_vertices(faces: &[Face]) -> Vec<Position> {
    let mut vertices: Vec<Position> = Vec::new();
    for face in faces {
        for vertex in &face.vertices {
            if !vertices
                .iter()
                .any(|existing| math::almost_zero(&(existing - vertex)))
            {
                vertices.push(*vertex);
            }
        }
    }
    vertices
}

/// Computes the volume, center of mass and inertia tensor (about the center
/// of mass, for uniform unit density) of the polyhedron bounded by the given
/// faces, by accumulating signed-tetrahedron contributions about the vertex
/// centroid and shifting the result to the center of mass with the parallel
/// axis theorem.
fn compute_mass_properties(
    faces: &[Face],
    vertices: &[Position],
) -> (fph, Position, Matrix3<fph>) {
    let center: Position = Point3::from(
        vertices
            .iter()
            .map(|vertex| vertex.coords)
            .sum::<Vector3<fph>>()
            / (vertices.len() as fph),
    );

    let mut volume = 0.0;
    let mut weighted_centroids = Vector3::zeros();
    let mut second_moments = Matrix3::zeros();

    for face in faces {
        for idx in 1..face.vertices.len() - 1 {
            let p1 = face.vertices[0];
            let p2 = face.vertices[idx];
            let p3 = face.vertices[idx + 1];

            let a = p1 - center;
            let b = p2 - center;
            let d = p3 - center;

            let tetrahedron_volume = a.dot(&b.cross(&d)) / 6.0;
            volume += tetrahedron_volume;

            weighted_centroids += tetrahedron_volume
                * (center.coords + p1.coords + p2.coords + p3.coords)
                / 4.0;

            // Second moments of the tetrahedron about the chosen center,
            // integrated with the canonical tetrahedron formula
            let edge_sum = a + b + d;
            second_moments += (tetrahedron_volume / 20.0)
                * (a * a.transpose()
                    + b * b.transpose()
                    + d * d.transpose()
                    + edge_sum * edge_sum.transpose());
        }
    }

    if volume.abs() <= PRECISION {
        return (volume, center, Matrix3::zeros());
    }

    let center_of_mass = Point3::from(weighted_centroids / volume);

    let inertia_about_center =
        second_moments.trace() * Matrix3::identity() - second_moments;
    let inertia = inertia_about_center
        - point_mass_inertia_matrix(volume, &(center_of_mass - center));

    (volume, center_of_mass, inertia)
}

fn directions_almost_equal(
    direction_1: &Direction,
    direction_2: &Direction,
    epsilon: fph,
) -> bool {
    let difference = direction_1.into_inner() - direction_2.into_inner();
    difference.x.abs() + difference.y.abs() + difference.z.abs() < epsilon
}

fn add_unique_direction(directions: &mut Vec<Direction>, direction: Direction) {
    if !directions
        .iter()
        .any(|existing| math::almost_zero(&existing.cross(&direction)))
    {
        directions.push(direction);
    }
}

fn closest_point_on_segment(start: &Position, end: &Position, point: &Position) -> Position {
    let segment = end - start;
    let squared_length = segment.norm_squared();
    if squared_length < PRECISION {
        return *start;
    }
    let parameter = ((point - start).dot(&segment) / squared_length).clamp(0.0, 1.0);
    start + segment.scale(parameter)
}
