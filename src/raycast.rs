//! Ray queries against shapes.

use crate::{
    body::BodyId,
    fph,
    math::{Direction, PRECISION, Position},
    shape::Shape,
    transform::ReferenceFrame,
};
use nalgebra::Vector3;

/// A ray with an origin and a unit direction.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: Position,
    pub direction: Direction,
}

/// The result of a ray query against a [`World`](crate::world::World).
#[derive(Clone, Debug)]
pub struct RayHit {
    /// The body that was hit.
    pub body_id: BodyId,
    /// The distance from the ray origin to the hit point.
    pub distance: fph,
    /// The world space hit point.
    pub point: Position,
    /// The world space surface normal at the hit point.
    pub normal: Direction,
}

/// An intersection between a ray and a single shape, in the frame the ray
/// was expressed in.
#[derive(Clone, Debug)]
pub(crate) struct ShapeRayHit {
    pub distance: fph,
    pub point: Position,
    pub normal: Direction,
}

impl Ray {
    /// Creates a new ray with the given origin and unit direction.
    pub fn new(origin: Position, direction: Direction) -> Self {
        Self { origin, direction }
    }

    /// Returns the point at the given distance along the ray.
    pub fn point_at(&self, distance: fph) -> Position {
        self.origin + self.direction.scale(distance)
    }

    /// Expresses the ray in the given frame. Distances along the ray are
    /// preserved since the transform is rigid.
    pub(crate) fn to_frame(&self, frame: &ReferenceFrame) -> Self {
        Self {
            origin: frame.inverse_transform_point(&self.origin),
            direction: Direction::new_unchecked(
                frame.inverse_transform_vector(&self.direction),
            ),
        }
    }

    /// Whether the ray passes within the given distance of the given point.
    pub(crate) fn passes_within(&self, center: &Position, radius: fph) -> bool {
        let to_center = center - self.origin;
        let squared_distance_to_center = to_center.norm_squared();
        if squared_distance_to_center <= radius.powi(2) {
            return true;
        }
        let closest_approach = to_center.dot(&self.direction);
        if closest_approach < 0.0 {
            return false;
        }
        squared_distance_to_center - closest_approach.powi(2) <= radius.powi(2)
    }
}

/// Computes the nearest intersection of the given ray with the given shape,
/// both expressed in the shape's local frame.
pub(crate) fn ray_shape_intersection(ray: &Ray, shape: &Shape) -> Option<ShapeRayHit> {
    match shape {
        Shape::Plane => ray_plane_intersection(ray),
        Shape::Sphere { radius } => ray_sphere_intersection(ray, *radius),
        Shape::Convex(hull) => ray_hull_intersection(ray, hull),
    }
}

/// Intersection with the local plane (through the origin, +z normal). Only
/// the front side of the plane is hit.
fn ray_plane_intersection(ray: &Ray) -> Option<ShapeRayHit> {
    let direction_dot_normal = ray.direction.z;
    if direction_dot_normal >= 0.0 {
        return None;
    }
    let distance = -ray.origin.z / direction_dot_normal;
    if distance < 0.0 {
        return None;
    }
    Some(ShapeRayHit {
        distance,
        point: ray.point_at(distance),
        normal: Vector3::z_axis(),
    })
}

/// Intersection with the local sphere (centered on the origin), taking the
/// smaller non-negative root of the quadratic.
fn ray_sphere_intersection(ray: &Ray, radius: fph) -> Option<ShapeRayHit> {
    let origin = ray.origin.coords;
    let half_b = origin.dot(&ray.direction);
    let c = origin.norm_squared() - radius.powi(2);

    let discriminant = half_b.powi(2) - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_discriminant = discriminant.sqrt();

    let distance = if -half_b - sqrt_discriminant >= 0.0 {
        -half_b - sqrt_discriminant
    } else if -half_b + sqrt_discriminant >= 0.0 {
        -half_b + sqrt_discriminant
    } else {
        return None;
    };

    let point = ray.point_at(distance);
    Some(ShapeRayHit {
        distance,
        normal: Direction::new_normalize(point.coords),
        point,
    })
}

/// Intersection with a convex hull: the nearest front-facing face whose
/// plane intersection falls within the face contour.
fn ray_hull_intersection(ray: &Ray, hull: &crate::geometry::ConvexHull) -> Option<ShapeRayHit> {
    let mut nearest: Option<ShapeRayHit> = None;

    for face in hull.faces() {
        let direction_dot_normal = ray.direction.dot(face.normal());
        if direction_dot_normal >= 0.0 {
            continue;
        }

        let distance = (face.vertices()[0] - ray.origin).dot(face.normal()) / direction_dot_normal;
        if distance < 0.0 {
            continue;
        }

        let point = ray.point_at(distance);
        if !face.contains_point_in_plane(&point) {
            continue;
        }

        if nearest
            .as_ref()
            .is_none_or(|hit| distance < hit.distance)
        {
            nearest = Some(ShapeRayHit {
                distance,
                point,
                normal: *face.normal(),
            });
        }
    }

    nearest
}

/// Returns [`None`] for directions shorter than [`PRECISION`], otherwise the
/// normalized direction.
pub(crate) fn normalize_ray_direction(direction: Vector3<fph>) -> Option<Direction> {
    Direction::try_new(direction, PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ConvexHull;
    use approx::assert_abs_diff_eq;
    use nalgebra::point;

    fn downward_ray_from(origin: Position) -> Ray {
        Ray::new(origin, -Vector3::z_axis())
    }

    #[test]
    fn ray_hits_sphere_front_surface() {
        let ray = downward_ray_from(point![0.0, 0.0, 10.0]);
        let hit = ray_sphere_intersection(&ray, 1.0).unwrap();
        assert_abs_diff_eq!(hit.distance, 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.point, point![0.0, 0.0, 1.0], epsilon = 1e-12);
        assert_abs_diff_eq!(
            hit.normal.into_inner(),
            Vector3::z_axis().into_inner(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn ray_from_inside_sphere_hits_far_surface() {
        let ray = downward_ray_from(Position::origin());
        let hit = ray_sphere_intersection(&ray, 1.0).unwrap();
        assert_abs_diff_eq!(hit.distance, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.point, point![0.0, 0.0, -1.0], epsilon = 1e-12);
    }

    #[test]
    fn ray_missing_sphere_yields_no_hit() {
        let ray = downward_ray_from(point![2.0, 0.0, 10.0]);
        assert!(ray_sphere_intersection(&ray, 1.0).is_none());
    }

    #[test]
    fn ray_hits_plane_only_from_the_front() {
        let hit = ray_plane_intersection(&downward_ray_from(point![1.0, 2.0, 5.0])).unwrap();
        assert_abs_diff_eq!(hit.distance, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.point, point![1.0, 2.0, 0.0], epsilon = 1e-12);

        let upward_ray = Ray::new(point![0.0, 0.0, -5.0], Vector3::z_axis());
        assert!(ray_plane_intersection(&upward_ray).is_none());
    }

    #[test]
    fn ray_hits_nearest_face_of_box() {
        let hull = ConvexHull::from_box(2.0, 2.0, 2.0);
        let ray = downward_ray_from(point![0.5, -0.5, 10.0]);
        let hit = ray_shape_intersection(&ray, &Shape::Convex(hull)).unwrap();
        assert_abs_diff_eq!(hit.distance, 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.point, point![0.5, -0.5, 1.0], epsilon = 1e-12);
        assert_abs_diff_eq!(
            hit.normal.into_inner(),
            Vector3::z_axis().into_inner(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn ray_past_box_edge_yields_no_hit() {
        let hull = ConvexHull::from_box(2.0, 2.0, 2.0);
        let ray = downward_ray_from(point![1.5, 0.0, 10.0]);
        assert!(ray_shape_intersection(&ray, &Shape::Convex(hull)).is_none());
    }

    #[test]
    fn bounding_sphere_prefilter_accepts_and_rejects() {
        let ray = downward_ray_from(point![0.0, 0.0, 10.0]);
        assert!(ray.passes_within(&point![0.3, 0.0, 0.0], 1.0));
        assert!(!ray.passes_within(&point![3.0, 0.0, 0.0], 1.0));
        // A ray starting inside the sphere always passes within it
        let inside_ray = downward_ray_from(Position::origin());
        assert!(inside_ray.passes_within(&point![0.0, 0.0, 0.2], 1.0));
    }

    #[test]
    fn zero_length_direction_is_rejected() {
        assert!(normalize_ray_direction(Vector3::zeros()).is_none());
        assert!(normalize_ray_direction(Vector3::z_axis().into_inner()).is_some());
    }
}
