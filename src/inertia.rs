//! Representation of inertia tensors.

use crate::{fph, math::Orientation};
use approx::AbsDiffEq;
use nalgebra::{Matrix3, Vector3};

/// The inertia tensor of a rigid body, defined with respect to the body's
/// center of mass. The inverse of the matrix is cached alongside it, since
/// the simulation needs the inverse at least as often as the tensor itself.
#[derive(Clone, Debug, PartialEq)]
pub struct InertiaTensor {
    matrix: Matrix3<fph>,
    inverse_matrix: Matrix3<fph>,
}

impl InertiaTensor {
    /// Creates a new identity inertia tensor.
    pub fn identity() -> Self {
        Self::from_matrix_and_inverse(Matrix3::identity(), Matrix3::identity())
    }

    /// Creates a new inertia tensor corresponding to the given matrix.
    ///
    /// # Panics
    /// If the given matrix is not invertible.
    pub fn from_matrix(matrix: Matrix3<fph>) -> Self {
        let inverse_matrix = matrix
            .try_inverse()
            .expect("Tried creating inertia tensor with singular matrix");
        Self::from_matrix_and_inverse(matrix, inverse_matrix)
    }

    /// Creates an inertia tensor corresponding to the given matrix and its
    /// inverse.
    pub const fn from_matrix_and_inverse(
        matrix: Matrix3<fph>,
        inverse_matrix: Matrix3<fph>,
    ) -> Self {
        Self {
            matrix,
            inverse_matrix,
        }
    }

    /// Creates a new diagonal inertia tensor with the given diagonal elements.
    ///
    /// # Panics
    /// If any of the given elements does not exceed zero.
    pub fn from_diagonal_elements(j_xx: fph, j_yy: fph, j_zz: fph) -> Self {
        assert!(
            j_xx > 0.0 && j_yy > 0.0 && j_zz > 0.0,
            "Tried creating inertia tensor with diagonal element not exceeding zero"
        );

        let matrix = Matrix3::from_diagonal(&Vector3::new(j_xx, j_yy, j_zz));
        let inverse_matrix =
            Matrix3::from_diagonal(&Vector3::new(1.0 / j_xx, 1.0 / j_yy, 1.0 / j_zz));

        Self::from_matrix_and_inverse(matrix, inverse_matrix)
    }

    /// Returns a reference to the inertia matrix.
    pub const fn matrix(&self) -> &Matrix3<fph> {
        &self.matrix
    }

    /// Returns a reference to the inverse of the inertia matrix.
    pub const fn inverse_matrix(&self) -> &Matrix3<fph> {
        &self.inverse_matrix
    }

    /// Computes the inertia tensor corresponding to rotating the body with
    /// the given rotation quaternion and returns it as a matrix.
    pub fn rotated_matrix(&self, rotation: &Orientation) -> Matrix3<fph> {
        let rotation_matrix = rotation.to_rotation_matrix();
        rotation_matrix * self.matrix * rotation_matrix.transpose()
    }

    /// Computes the inertia tensor corresponding to rotating the body with
    /// the given rotation quaternion and returns its inverse as a matrix.
    pub fn inverse_rotated_matrix(&self, rotation: &Orientation) -> Matrix3<fph> {
        let rotation_matrix = rotation.to_rotation_matrix();
        rotation_matrix * self.inverse_matrix * rotation_matrix.transpose()
    }

    /// Computes the inertia tensor corresponding to rotating the body with
    /// the given rotation quaternion.
    pub fn rotated(&self, rotation: &Orientation) -> Self {
        Self::from_matrix_and_inverse(
            self.rotated_matrix(rotation),
            self.inverse_rotated_matrix(rotation),
        )
    }
}

impl AbsDiffEq for InertiaTensor {
    type Epsilon = <fph as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        fph::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        Matrix3::abs_diff_eq(&self.matrix, &other.matrix, epsilon)
    }
}

/// Computes the inertia matrix of a point mass at the given displacement from
/// the reference point: `m (|d|² Id - d dᵀ)`.
///
/// Subtracting this matrix from an inertia tensor defined about an arbitrary
/// reference point shifts the tensor to be defined about the center of mass
/// (the parallel axis theorem, with `d` the displacement from the reference
/// point to the center of mass).
pub fn point_mass_inertia_matrix(mass: fph, displacement: &Vector3<fph>) -> Matrix3<fph> {
    mass * (displacement.norm_squared() * Matrix3::identity()
        - displacement * displacement.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector3, vector};
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    prop_compose! {
        fn rotation_strategy()(
            rotation_z in 0.0..2.0 * PI,
            rotation_x in -FRAC_PI_2..FRAC_PI_2,
        ) -> Orientation {
            Orientation::from_axis_angle(&Vector3::z_axis(), rotation_z)
                * Orientation::from_axis_angle(&Vector3::x_axis(), rotation_x)
        }
    }

    proptest! {
        #[test]
        fn rotated_tensor_keeps_inverse_consistent(rotation in rotation_strategy()) {
            let tensor = InertiaTensor::from_diagonal_elements(1.0, 2.0, 3.0);
            let rotated = tensor.rotated(&rotation);
            prop_assert!(
                (rotated.matrix() * rotated.inverse_matrix() - Matrix3::identity()).norm() < 1e-10
            );
        }
    }

    #[test]
    fn rotating_diagonal_tensor_by_quarter_turn_permutes_moments() {
        let tensor = InertiaTensor::from_diagonal_elements(1.0, 2.0, 3.0);
        let rotation = Orientation::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let rotated = tensor.rotated_matrix(&rotation);
        assert_abs_diff_eq!(
            rotated,
            Matrix3::from_diagonal(&vector![2.0, 1.0, 3.0]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn point_mass_inertia_is_zero_normal_to_displacement() {
        let inertia = point_mass_inertia_matrix(2.0, &vector![3.0, 0.0, 0.0]);
        // No moment about the axis through the point mass
        assert_abs_diff_eq!(inertia.m11, 0.0);
        // Full m r^2 about the perpendicular axes
        assert_abs_diff_eq!(inertia.m22, 18.0);
        assert_abs_diff_eq!(inertia.m33, 18.0);
    }
}
