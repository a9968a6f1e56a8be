//! Reference frames.

use crate::{
    fph,
    math::{Orientation, Position},
};
use approx::AbsDiffEq;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

/// A rigid transform consisting of a translation and a rotation, used both as
/// the pose of a body in world space and as the offset of a shape within a
/// body.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReferenceFrame {
    /// The coordinates of the origin of the frame measured in the parent
    /// space.
    pub position: Position,
    /// The orientation of the frame in the parent space.
    pub orientation: Orientation,
}

impl ReferenceFrame {
    /// Creates a new reference frame with the given position and orientation.
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Creates a new reference frame with the given position and the identity
    /// orientation.
    pub fn unoriented(position: Position) -> Self {
        Self::new(position, Orientation::identity())
    }

    /// Creates a new reference frame with the given orientation, located at
    /// the origin.
    pub fn unlocated(orientation: Orientation) -> Self {
        Self::new(Position::origin(), orientation)
    }

    /// The identity frame, coinciding with its parent space.
    pub fn identity() -> Self {
        Self::new(Position::origin(), Orientation::identity())
    }

    /// Transforms the given point from this frame to the parent space.
    pub fn transform_point(&self, point: &Position) -> Position {
        self.orientation.transform_point(point) + self.position.coords
    }

    /// Transforms the given point from the parent space into this frame.
    pub fn inverse_transform_point(&self, point: &Position) -> Position {
        self.orientation
            .inverse_transform_point(&Point3::from(point - self.position))
    }

    /// Rotates the given vector from this frame to the parent space.
    pub fn transform_vector(&self, vector: &Vector3<fph>) -> Vector3<fph> {
        self.orientation.transform_vector(vector)
    }

    /// Rotates the given vector from the parent space into this frame.
    pub fn inverse_transform_vector(&self, vector: &Vector3<fph>) -> Vector3<fph> {
        self.orientation.inverse_transform_vector(vector)
    }

    /// Computes the frame obtained by placing this frame within the given
    /// outer frame (`outer` maps the space this frame is expressed in to its
    /// own parent space).
    pub fn transformed_by(&self, outer: &Self) -> Self {
        Self::new(
            outer.transform_point(&self.position),
            outer.orientation * self.orientation,
        )
    }

    /// Creates the [`Isometry3`] transform from this frame to the parent
    /// space.
    pub fn to_isometry(&self) -> Isometry3<fph> {
        Isometry3::from_parts(Translation3::from(self.position.coords), self.orientation)
    }
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl AbsDiffEq for ReferenceFrame {
    type Epsilon = <fph as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        fph::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        Position::abs_diff_eq(&self.position, &other.position, epsilon)
            && UnitQuaternion::abs_diff_eq(&self.orientation, &other.orientation, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{point, vector};
    use std::f64::consts::FRAC_PI_2;

    fn quarter_turn_about_z() -> Orientation {
        Orientation::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)
    }

    #[test]
    fn transforming_point_applies_rotation_then_translation() {
        let frame = ReferenceFrame::new(point![1.0, 2.0, 3.0], quarter_turn_about_z());
        let transformed = frame.transform_point(&point![1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(transformed, point![1.0, 3.0, 3.0], epsilon = 1e-12);
    }

    #[test]
    fn inverse_transform_undoes_transform() {
        let frame = ReferenceFrame::new(point![-0.5, 4.0, 1.5], quarter_turn_about_z());
        let point = point![0.1, -0.7, 2.3];
        let round_tripped = frame.inverse_transform_point(&frame.transform_point(&point));
        assert_abs_diff_eq!(round_tripped, point, epsilon = 1e-12);

        let vector = vector![1.0, 2.0, -3.0];
        let round_tripped = frame.inverse_transform_vector(&frame.transform_vector(&vector));
        assert_abs_diff_eq!(round_tripped, vector, epsilon = 1e-12);
    }

    #[test]
    fn composed_frame_matches_sequential_application() {
        let inner = ReferenceFrame::new(point![0.0, 1.0, 0.0], quarter_turn_about_z());
        let outer = ReferenceFrame::new(point![5.0, 0.0, 0.0], quarter_turn_about_z());
        let composed = inner.transformed_by(&outer);

        let point = point![0.3, 0.4, 0.5];
        assert_abs_diff_eq!(
            composed.transform_point(&point),
            outer.transform_point(&inner.transform_point(&point)),
            epsilon = 1e-12
        );
    }

    #[test]
    fn isometry_agrees_with_frame_transform() {
        let frame = ReferenceFrame::new(point![1.0, -2.0, 0.5], quarter_turn_about_z());
        let point = point![-1.0, 0.0, 2.0];
        assert_abs_diff_eq!(
            frame.to_isometry().transform_point(&point),
            frame.transform_point(&point),
            epsilon = 1e-12
        );
    }
}
