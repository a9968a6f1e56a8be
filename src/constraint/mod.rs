//! Contact constraints on rigid bodies.

pub mod contact;
pub mod solver;

use crate::{
    body::Body,
    fph,
    math::{AngularVelocity, Direction, Position, Velocity},
};
use nalgebra::{Matrix3, Vector3};

/// The relevant properties and state of a rigid body required for constraint
/// solving. The velocities are updated iteratively as constraints are being
/// solved.
#[derive(Clone, Debug)]
pub(crate) struct ConstrainedBody {
    /// Inverse of the body's mass (zero for a static body).
    pub inverse_mass: fph,
    /// Inverse of the body's inertia tensor in world space (zero for a
    /// static body).
    pub inverse_inertia_tensor: Matrix3<fph>,
    /// Position of the body's center of mass in world space.
    pub position: Position,
    /// Linear velocity of the body's center of mass.
    pub velocity: Velocity,
    /// Angular velocity of the body about its center of mass.
    pub angular_velocity: AngularVelocity,
}

impl ConstrainedBody {
    pub(crate) fn from_body(body: &Body) -> Self {
        Self {
            inverse_mass: body.inverse_mass(),
            inverse_inertia_tensor: *body.inverse_inertia_world(),
            position: *body.position(),
            velocity: *body.velocity(),
            angular_velocity: *body.angular_velocity(),
        }
    }

    /// Velocity of the material point at the given displacement from the
    /// body's center of mass.
    pub(crate) fn point_velocity(&self, disp: &Vector3<fph>) -> Velocity {
        self.velocity + self.angular_velocity.cross(disp)
    }

    /// This body's contribution to the inverse effective mass of a
    /// constraint acting along `direction` at the given displacement from
    /// the center of mass. The row's effective mass is the reciprocal of the
    /// two bodies' summed contributions.
    pub(crate) fn inverse_effective_mass_along(
        &self,
        disp: &Vector3<fph>,
        direction: &Direction,
    ) -> fph {
        let lever = disp.cross(direction);
        self.inverse_mass + lever.dot(&(self.inverse_inertia_tensor * lever))
    }
}
