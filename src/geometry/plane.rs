//! Representation of planes.

use crate::{
    fph,
    math::{Direction, Position},
    transform::ReferenceFrame,
};

/// A plane in 3D, represented by a unit normal and a displacement.
///
/// The displacement `d` can be determined from the normal `n` and any point
/// `p` lying on the plane as `d = n.dot(p)`. By storing the displacement
/// instead of the point, we remove redundant degrees of freedom.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    unit_normal: Direction,
    displacement: fph,
}

impl Plane {
    /// Creates a new plane defined by the given unit normal vector and
    /// displacement.
    pub const fn new(unit_normal: Direction, displacement: fph) -> Self {
        Self {
            unit_normal,
            displacement,
        }
    }

    /// Creates a new plane defined by the given unit normal vector and point
    /// in the plane.
    pub fn from_normal_and_point(unit_normal: Direction, point_in_plane: &Position) -> Self {
        let displacement = unit_normal.dot(&point_in_plane.coords);
        Self::new(unit_normal, displacement)
    }

    /// Returns the unit normal vector of the plane.
    pub fn unit_normal(&self) -> &Direction {
        &self.unit_normal
    }

    /// Returns the displacement of the plane.
    pub fn displacement(&self) -> fph {
        self.displacement
    }

    /// Computes the signed distance from the plane to the given point. A
    /// negative value means the point lies behind the plane (on the side the
    /// normal points away from).
    pub fn compute_signed_distance(&self, point: &Position) -> fph {
        self.unit_normal.dot(&point.coords) - self.displacement
    }

    /// Returns the projection of the given point onto this plane.
    pub fn project_point_onto_plane(&self, point: &Position) -> Position {
        point - self.unit_normal.scale(self.compute_signed_distance(point))
    }

    /// Computes the plane obtained by transforming this plane with the given
    /// frame.
    pub fn transformed(&self, frame: &ReferenceFrame) -> Self {
        let unit_normal =
            Direction::new_unchecked(frame.transform_vector(&self.unit_normal));
        let displacement = self.displacement + unit_normal.dot(&frame.position.coords);
        Self::new(unit_normal, displacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Orientation;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector3, point};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn signed_distance_is_positive_in_front_of_plane() {
        let plane = Plane::new(Vector3::z_axis(), 1.0);
        assert_abs_diff_eq!(plane.compute_signed_distance(&point![0.0, 0.0, 3.0]), 2.0);
        assert_abs_diff_eq!(plane.compute_signed_distance(&point![5.0, 5.0, 0.0]), -1.0);
    }

    #[test]
    fn projected_point_lies_on_plane() {
        let plane = Plane::from_normal_and_point(Vector3::x_axis(), &point![2.0, 0.0, 0.0]);
        let projected = plane.project_point_onto_plane(&point![7.0, 1.0, -4.0]);
        assert_abs_diff_eq!(projected, point![2.0, 1.0, -4.0], epsilon = 1e-12);
    }

    #[test]
    fn transformed_plane_follows_frame() {
        let plane = Plane::new(Vector3::z_axis(), 0.0);
        let frame = ReferenceFrame::new(
            point![0.0, 0.0, 2.0],
            Orientation::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
        );
        let transformed = plane.transformed(&frame);
        // The local +z normal rotates onto -y; the plane passes through (0, 0, 2)
        assert_abs_diff_eq!(
            transformed.unit_normal().into_inner(),
            -Vector3::y_axis().into_inner(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            transformed.compute_signed_distance(&point![0.0, 0.0, 2.0]),
            0.0,
            epsilon = 1e-12
        );
    }
}
