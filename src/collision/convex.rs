//! Convex-convex contact generation with the separating axis test and
//! reference-face clipping.

use crate::{
    constraint::contact::ContactGeometry,
    fph,
    geometry::ConvexHull,
    math::{Direction, PRECISION, Position},
};
use nalgebra::Vector3;

/// Penetrations deeper than this are treated as sentinel values from
/// degenerate states and discarded.
const MAX_PENETRATION_DEPTH: fph = 100.0;

/// The maximum number of contact points retained per convex pair; the
/// deepest ones are kept.
const MAX_CONTACTS: usize = 4;

/// Generates the contacts between two convex hulls in world space and passes
/// them to `emit` along with their feature indices (reference face on A,
/// incident face on B, clipped vertex). Contact normals point from hull A
/// toward hull B.
pub(crate) fn generate_convex_convex_contacts(
    hull_a: &ConvexHull,
    hull_b: &ConvexHull,
    emit: &mut impl FnMut(ContactGeometry, [usize; 3]),
) {
    let Some(axis) = find_minimum_overlap_axis(hull_a, hull_b) else {
        return;
    };

    // Reference face: the face of A whose outward normal best aligns with
    // the separating axis. Incident face: the face of B that most opposes
    // the axis.
    let (reference_face_idx, _) = hull_a
        .faces()
        .iter()
        .enumerate()
        .map(|(idx, face)| (idx, face.normal().dot(&axis)))
        .max_by(|(_, dot_1), (_, dot_2)| dot_1.total_cmp(dot_2))
        .expect("hull must have at least one face");

    let (incident_face_idx, _) = hull_b
        .faces()
        .iter()
        .enumerate()
        .map(|(idx, face)| (idx, face.normal().dot(&axis)))
        .min_by(|(_, dot_1), (_, dot_2)| dot_1.total_cmp(dot_2))
        .expect("hull must have at least one face");

    let reference_face = &hull_a.faces()[reference_face_idx];
    let incident_face = &hull_b.faces()[incident_face_idx];

    // Clip the incident polygon against the side planes of the reference
    // face, then keep the clipped vertices behind the reference face plane
    let mut polygon: Vec<Position> = incident_face.vertices().to_vec();

    let reference_vertices = reference_face.vertices();
    let n_reference_vertices = reference_vertices.len();
    for idx in 0..n_reference_vertices {
        if polygon.is_empty() {
            return;
        }
        let edge_start = reference_vertices[idx];
        let edge = reference_vertices[(idx + 1) % n_reference_vertices] - edge_start;
        let side_plane_normal = edge.cross(reference_face.normal());
        polygon = clip_polygon_against_plane(&polygon, &edge_start, &side_plane_normal);
    }

    let mut candidates: Vec<(fph, Position, usize)> = polygon
        .into_iter()
        .enumerate()
        .filter_map(|(vertex_idx, vertex)| {
            let signed_distance = reference_face.compute_signed_distance(&vertex);
            let penetration_depth = -signed_distance;
            if penetration_depth >= -PRECISION && penetration_depth <= MAX_PENETRATION_DEPTH {
                Some((fph::max(0.0, penetration_depth), vertex, vertex_idx))
            } else {
                None
            }
        })
        .collect();

    // Keep the deepest contacts for stability
    candidates.sort_by(|(depth_1, _, _), (depth_2, _, _)| depth_2.total_cmp(depth_1));
    candidates.truncate(MAX_CONTACTS);

    for (penetration_depth, position, vertex_idx) in candidates {
        emit(
            ContactGeometry {
                position,
                normal: *reference_face.normal(),
                penetration_depth,
            },
            [reference_face_idx, incident_face_idx, vertex_idx],
        );
    }
}

/// Runs the separating axis test over the face normals of both hulls and the
/// pairwise edge-direction cross products. Returns the axis of minimum
/// overlap oriented from hull A toward hull B, or [`None`] if a separating
/// axis exists.
fn find_minimum_overlap_axis(hull_a: &ConvexHull, hull_b: &ConvexHull) -> Option<Direction> {
    let mut minimum_overlap = fph::INFINITY;
    let mut minimum_overlap_axis = None;

    let mut test_axis = |axis: Direction| -> bool {
        let (min_a, max_a) = project_onto_axis(hull_a, &axis);
        let (min_b, max_b) = project_onto_axis(hull_b, &axis);

        let overlap = fph::min(max_a, max_b) - fph::max(min_a, min_b);
        if overlap < 0.0 {
            return false;
        }
        if overlap < minimum_overlap {
            minimum_overlap = overlap;
            minimum_overlap_axis = Some(axis);
        }
        true
    };

    for normal in hull_a.unique_normals() {
        if !test_axis(*normal) {
            return None;
        }
    }
    for normal in hull_b.unique_normals() {
        if !test_axis(*normal) {
            return None;
        }
    }
    for edge_a in hull_a.unique_edges() {
        for edge_b in hull_b.unique_edges() {
            if let Some(axis) = Direction::try_new(edge_a.cross(edge_b), PRECISION) {
                if !test_axis(axis) {
                    return None;
                }
            }
        }
    }

    let axis = minimum_overlap_axis?;

    // Orient the axis to point from A toward B
    let center_displacement = hull_b.center_of_mass() - hull_a.center_of_mass();
    if axis.dot(&center_displacement) < 0.0 {
        Some(-axis)
    } else {
        Some(axis)
    }
}

fn project_onto_axis(hull: &ConvexHull, axis: &Direction) -> (fph, fph) {
    let mut min_projection = fph::INFINITY;
    let mut max_projection = fph::NEG_INFINITY;
    for vertex in hull.vertices() {
        let projection = axis.dot(&vertex.coords);
        min_projection = fph::min(min_projection, projection);
        max_projection = fph::max(max_projection, projection);
    }
    (min_projection, max_projection)
}

/// Sutherland-Hodgman clipping of a polygon against a single plane; the part
/// of the polygon behind the plane (opposite the normal) is kept.
fn clip_polygon_against_plane(
    polygon: &[Position],
    plane_point: &Position,
    plane_normal: &Vector3<fph>,
) -> Vec<Position> {
    let mut clipped = Vec::with_capacity(polygon.len() + 1);

    for idx in 0..polygon.len() {
        let current = polygon[idx];
        let previous = polygon[(idx + polygon.len() - 1) % polygon.len()];

        let current_distance = (current - plane_point).dot(plane_normal);
        let previous_distance = (previous - plane_point).dot(plane_normal);

        let current_inside = current_distance <= 0.0;
        let previous_inside = previous_distance <= 0.0;

        if current_inside != previous_inside {
            let parameter = previous_distance / (previous_distance - current_distance);
            clipped.push(previous + (current - previous) * parameter);
        }
        if current_inside {
            clipped.push(current);
        }
    }

    clipped
}
