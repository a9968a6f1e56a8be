//! Physical quantities and numerical helpers.

use crate::fph;
use nalgebra::{Point3, Quaternion, Unit, UnitQuaternion, Vector3};

/// A unit vector in 3D space.
pub type Direction = Unit<Vector3<fph>>;

/// A position in 3D space.
pub type Position = Point3<fph>;

/// A velocity in 3D space.
pub type Velocity = Vector3<fph>;

/// An angular velocity in 3D space.
pub type AngularVelocity = Vector3<fph>;

/// An orientation in 3D space.
pub type Orientation = UnitQuaternion<fph>;

/// A 3D force.
pub type Force = Vector3<fph>;

/// A 3D torque.
pub type Torque = Vector3<fph>;

/// Tolerance below which directions and distances are considered
/// indistinguishable.
pub const PRECISION: fph = 1e-6;

/// Sentinel magnitude used for unbounded extents, for instance the bounding
/// box of an infinite plane.
pub const MAX_NUMBER: fph = 1e38;

/// Whether the given vector is indistinguishable from the zero vector, as
/// measured by the taxicab norm against [`PRECISION`].
pub fn almost_zero(vector: &Vector3<fph>) -> bool {
    vector.x.abs() + vector.y.abs() + vector.z.abs() < PRECISION
}

/// Computes the quaternion representing the instantaneous time derivative of
/// the given orientation for a body with the given angular velocity.
pub fn compute_orientation_derivative(
    orientation: &Orientation,
    angular_velocity: &AngularVelocity,
) -> Quaternion<fph> {
    Quaternion::from_imag(0.5 * angular_velocity) * orientation.as_ref()
}

/// Advances the given orientation by one time step of the given angular
/// velocity and renormalizes it.
pub fn advance_orientation(
    orientation: &Orientation,
    angular_velocity: &AngularVelocity,
    step_duration: fph,
) -> Orientation {
    UnitQuaternion::new_normalize(
        orientation.as_ref()
            + compute_orientation_derivative(orientation, angular_velocity) * step_duration,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::vector;

    #[test]
    fn almost_zero_uses_taxicab_norm() {
        assert!(almost_zero(&vector![0.0, 0.0, 0.0]));
        assert!(almost_zero(&vector![3e-7, 3e-7, 3e-7]));
        assert!(!almost_zero(&vector![4e-7, 4e-7, 4e-7]));
        assert!(!almost_zero(&vector![1e-3, 0.0, 0.0]));
    }

    #[test]
    fn advancing_orientation_matches_axis_angle_rotation_for_small_steps() {
        let orientation = Orientation::identity();
        let angular_speed = 0.1;
        let step_duration = 1e-3;

        let advanced = advance_orientation(
            &orientation,
            &vector![0.0, 0.0, angular_speed],
            step_duration,
        );
        let expected =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angular_speed * step_duration);

        assert_abs_diff_eq!(advanced, expected, epsilon = 1e-9);
    }
}
