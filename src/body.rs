//! Rigid bodies.

use crate::{
    fph,
    geometry::AxisAlignedBox,
    inertia::{InertiaTensor, point_mass_inertia_matrix},
    math::{self, AngularVelocity, Force, Orientation, Position, Torque, Velocity},
    shape::{BodyShape, Shape},
    transform::ReferenceFrame,
};
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix3, Vector3};

/// Identifier for a [`Body`] in a [`World`](crate::world::World).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Zeroable, Pod)]
pub struct BodyId(pub u32);

/// Parameters quantifying the physical response of a body in contact with
/// another body.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    /// The strength of Coulomb friction at contacts with the body.
    pub friction: fph,
    /// The elasticity of collisions with the body, typically between 0
    /// (fully inelastic) and 1 (the bodies bounce maximally apart).
    pub restitution: fph,
}

/// A rigid body with a fixed set of collision shapes.
///
/// A body with zero mass is static: it has infinite inertia, is never
/// integrated and ignores forces, but still generates contacts.
#[derive(Clone, Debug)]
pub struct Body {
    mass: fph,
    inverse_mass: fph,
    inertia_tensor: InertiaTensor,
    inverse_inertia_world: Matrix3<fph>,
    position: Position,
    orientation: Orientation,
    velocity: Velocity,
    angular_velocity: AngularVelocity,
    total_force: Force,
    total_torque: Torque,
    linear_damping: fph,
    angular_damping: fph,
    shapes: Vec<BodyShape>,
    bounding_sphere_radius: fph,
    material: Material,
}

/// Builder capturing the mass, material, initial state and shapes of a body
/// before it is added to a [`World`](crate::world::World).
#[derive(Clone, Debug)]
pub struct BodyBuilder {
    mass: fph,
    material: Material,
    position: Position,
    orientation: Orientation,
    velocity: Velocity,
    angular_velocity: AngularVelocity,
    linear_damping: fph,
    angular_damping: fph,
    shapes: Vec<BodyShape>,
}

impl Material {
    /// Creates a new material with the given friction and restitution
    /// coefficients.
    pub fn new(friction: fph, restitution: fph) -> Self {
        Self {
            friction,
            restitution,
        }
    }

    /// Computes the effective material to use when resolving a contact
    /// between two bodies, given the material of each of them.
    pub fn combined(&self, other: &Self) -> Self {
        Self {
            friction: fph::sqrt(self.friction * other.friction),
            restitution: fph::max(self.restitution, other.restitution),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.0,
        }
    }
}

impl BodyBuilder {
    /// Creates a builder for a dynamic body of unit mass at the origin, with
    /// no shapes and the default material.
    pub fn new() -> Self {
        Self {
            mass: 1.0,
            material: Material::default(),
            position: Position::origin(),
            orientation: Orientation::identity(),
            velocity: Velocity::zeros(),
            angular_velocity: AngularVelocity::zeros(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            shapes: Vec::new(),
        }
    }

    /// Creates a builder for a static (infinite-mass) body.
    pub fn static_body() -> Self {
        Self::new().with_mass(0.0)
    }

    /// Sets the mass of the body. Zero mass denotes a static body.
    ///
    /// # Panics
    /// If the given mass is negative.
    pub fn with_mass(mut self, mass: fph) -> Self {
        assert!(mass >= 0.0, "Tried creating body with negative mass");
        self.mass = mass;
        self
    }

    /// Sets the contact material of the body.
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Sets the initial position of the body.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Sets the initial orientation of the body.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the initial linear velocity of the body.
    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = velocity;
        self
    }

    /// Sets the initial angular velocity of the body.
    pub fn with_angular_velocity(mut self, angular_velocity: AngularVelocity) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Sets the linear and angular damping coefficients of the body.
    pub fn with_damping(mut self, linear_damping: fph, angular_damping: fph) -> Self {
        self.linear_damping = linear_damping;
        self.angular_damping = angular_damping;
        self
    }

    /// Adds a shape coinciding with the body frame.
    pub fn with_shape(self, shape: Shape) -> Self {
        self.with_offset_shape(ReferenceFrame::identity(), shape)
    }

    /// Adds a shape with the given offset frame within the body.
    pub fn with_offset_shape(mut self, frame: ReferenceFrame, shape: Shape) -> Self {
        self.shapes.push(BodyShape::new(frame, shape));
        self
    }

    pub(crate) fn build(self) -> Body {
        let Self {
            mass,
            material,
            position,
            orientation,
            velocity,
            angular_velocity,
            linear_damping,
            angular_damping,
            shapes,
        } = self;

        let bounding_sphere_radius = shapes.iter().fold(0.0, |radius, body_shape| {
            body_shape
                .shape
                .expand_bounding_sphere_radius(&body_shape.frame, radius)
        });

        let (inverse_mass, inertia_tensor) = if mass == 0.0 {
            (0.0, InertiaTensor::identity())
        } else {
            (1.0 / mass, compute_inertia_tensor(&shapes, mass))
        };

        let mut body = Body {
            mass,
            inverse_mass,
            inertia_tensor,
            inverse_inertia_world: Matrix3::zeros(),
            position,
            orientation,
            velocity,
            angular_velocity,
            total_force: Force::zeros(),
            total_torque: Torque::zeros(),
            linear_damping,
            angular_damping,
            shapes,
            bounding_sphere_radius,
            material,
        };
        body.refresh_inverse_world_inertia();
        body
    }
}

impl Default for BodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the inertia tensor about the body origin for the given shapes,
/// scaled so the total mass matches the given mass. Each shape contributes
/// its uniform-density inertia shifted to the body origin with the parallel
/// axis theorem. Shapes without volume fall back to the inertia of a unit
/// sphere carrying the full mass.
fn compute_inertia_tensor(shapes: &[BodyShape], mass: fph) -> InertiaTensor {
    let mut total_volume = 0.0;
    let mut inertia_about_origin = Matrix3::zeros();

    for body_shape in shapes {
        if let Some(contribution) = body_shape.mass_contribution() {
            total_volume += contribution.volume;
            inertia_about_origin += contribution.inertia
                + point_mass_inertia_matrix(
                    contribution.volume,
                    &contribution.center_of_mass.coords,
                );
        }
    }

    if total_volume <= math::PRECISION {
        let moment = (2.0 / 5.0) * mass;
        return InertiaTensor::from_diagonal_elements(moment, moment, moment);
    }

    InertiaTensor::from_matrix(inertia_about_origin * (mass / total_volume))
}

impl Body {
    /// Returns the mass of the body (zero for a static body).
    pub fn mass(&self) -> fph {
        self.mass
    }

    /// Returns the inverse mass of the body (zero for a static body).
    pub fn inverse_mass(&self) -> fph {
        self.inverse_mass
    }

    /// Whether the body is static.
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    /// Returns the local-frame inertia tensor of the body.
    pub fn inertia_tensor(&self) -> &InertiaTensor {
        &self.inertia_tensor
    }

    /// Returns the world-frame inverse inertia tensor of the body (the zero
    /// matrix for a static body).
    pub fn inverse_inertia_world(&self) -> &Matrix3<fph> {
        &self.inverse_inertia_world
    }

    /// Returns the position of the body's center of mass.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Returns the orientation of the body.
    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    /// Returns the pose of the body as a reference frame.
    pub fn frame(&self) -> ReferenceFrame {
        ReferenceFrame::new(self.position, self.orientation)
    }

    /// Returns the linear velocity of the body.
    pub fn velocity(&self) -> &Velocity {
        &self.velocity
    }

    /// Returns the angular velocity of the body.
    pub fn angular_velocity(&self) -> &AngularVelocity {
        &self.angular_velocity
    }

    /// Returns the contact material of the body.
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Returns the shapes of the body with their offset frames.
    pub fn shapes(&self) -> &[BodyShape] {
        &self.shapes
    }

    /// Returns the radius of the bounding sphere centered on the body
    /// position that encloses all shapes of the body.
    pub fn bounding_sphere_radius(&self) -> fph {
        self.bounding_sphere_radius
    }

    /// Computes the world-space axis-aligned bounding box enclosing all
    /// shapes of the body.
    ///
    /// # Panics
    /// If the body has no shapes.
    pub fn compute_aabb(&self) -> AxisAlignedBox {
        let body_frame = self.frame();
        let mut shapes = self.shapes.iter();
        let first = shapes
            .next()
            .expect("Tried to compute AABB for body with no shapes");
        let mut aabb = first.shape.compute_aabb(&first.world_frame(&body_frame));
        for body_shape in shapes {
            aabb = AxisAlignedBox::aabb_from_pair(
                &aabb,
                &body_shape
                    .shape
                    .compute_aabb(&body_shape.world_frame(&body_frame)),
            );
        }
        aabb
    }

    /// Accumulates the given force applied at the given world-space point,
    /// contributing torque about the center of mass. Has no effect on a
    /// static body.
    pub fn apply_force(&mut self, point: &Position, force: &Force) {
        if self.is_static() {
            return;
        }
        self.total_force += force;
        self.total_torque += (point - self.position).cross(force);
    }

    /// Accumulates the given torque about the center of mass. Has no effect
    /// on a static body.
    pub fn apply_torque(&mut self, torque: &Torque) {
        if self.is_static() {
            return;
        }
        self.total_torque += torque;
    }

    /// Applies the given impulse at the given world-space point, updating
    /// the linear and angular velocity directly. Has no effect on a static
    /// body.
    pub fn apply_impulse(&mut self, point: &Position, impulse: &Vector3<fph>) {
        self.velocity += self.inverse_mass * impulse;
        self.angular_velocity += self.inverse_inertia_world * (point - self.position).cross(impulse);
    }

    pub(crate) fn set_velocities(
        &mut self,
        velocity: Velocity,
        angular_velocity: AngularVelocity,
    ) {
        self.velocity = velocity;
        self.angular_velocity = angular_velocity;
    }

    pub(crate) fn refresh_inverse_world_inertia(&mut self) {
        self.inverse_inertia_world = if self.is_static() {
            Matrix3::zeros()
        } else {
            self.inertia_tensor
                .inverse_rotated_matrix(&self.orientation)
        };
    }

    /// Advances the velocities from the accumulated forces and the given
    /// gravity, then applies damping.
    pub(crate) fn advance_velocities(&mut self, gravity: &Vector3<fph>, step_duration: fph) {
        if self.is_static() {
            return;
        }

        self.velocity += (gravity + self.inverse_mass * self.total_force) * step_duration;
        self.angular_velocity += self.inverse_inertia_world * self.total_torque * step_duration;

        self.velocity *= fph::max(0.0, 1.0 - self.linear_damping * step_duration);
        self.angular_velocity *= fph::max(0.0, 1.0 - self.angular_damping * step_duration);
    }

    /// Advances the position and orientation from the current velocities and
    /// refreshes the world-frame inverse inertia.
    pub(crate) fn advance_configuration(&mut self, step_duration: fph) {
        if self.is_static() {
            return;
        }

        self.position += self.velocity * step_duration;
        self.orientation =
            math::advance_orientation(&self.orientation, &self.angular_velocity, step_duration);
        self.refresh_inverse_world_inertia();
    }

    pub(crate) fn reset_force_and_torque(&mut self) {
        self.total_force = Force::zeros();
        self.total_torque = Torque::zeros();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ConvexHull;
    use approx::assert_abs_diff_eq;
    use nalgebra::{point, vector};

    #[test]
    fn static_body_has_zero_inverse_mass_and_inertia() {
        let body = BodyBuilder::static_body().with_shape(Shape::Plane).build();
        assert!(body.is_static());
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.inverse_inertia_world(), &Matrix3::zeros());
    }

    #[test]
    fn box_body_inertia_matches_analytic_formula() {
        let body = BodyBuilder::new()
            .with_mass(8.0)
            .with_shape(Shape::Convex(ConvexHull::from_box(2.0, 2.0, 2.0)))
            .build();

        // Mass 8 box with full extents 2: I = (8/12)(4 + 4) on each axis
        let expected = (8.0 / 12.0) * 8.0;
        for idx in 0..3 {
            assert_abs_diff_eq!(
                body.inertia_tensor().matrix()[(idx, idx)],
                expected,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn force_applied_off_center_accumulates_torque() {
        let mut body = BodyBuilder::new()
            .with_shape(Shape::Sphere { radius: 1.0 })
            .build();
        body.apply_force(&point![0.0, 1.0, 0.0], &vector![1.0, 0.0, 0.0]);
        assert_eq!(body.total_force, vector![1.0, 0.0, 0.0]);
        assert_eq!(body.total_torque, vector![0.0, 0.0, -1.0]);
    }

    #[test]
    fn pure_torque_accumulates_without_force() {
        let mut body = BodyBuilder::new()
            .with_shape(Shape::Sphere { radius: 1.0 })
            .build();
        body.apply_torque(&vector![0.0, 2.0, 0.0]);
        assert_eq!(body.total_force, Force::zeros());
        assert_eq!(body.total_torque, vector![0.0, 2.0, 0.0]);
    }

    #[test]
    fn body_aabb_bounds_all_shapes() {
        let body = BodyBuilder::new()
            .with_position(point![0.0, 0.0, 2.0])
            .with_shape(Shape::Sphere { radius: 1.0 })
            .with_offset_shape(
                ReferenceFrame::unoriented(point![3.0, 0.0, 0.0]),
                Shape::Sphere { radius: 0.5 },
            )
            .build();
        let aabb = body.compute_aabb();
        assert_eq!(aabb.lower_corner(), &point![-1.0, -1.0, 1.0]);
        assert_eq!(aabb.upper_corner(), &point![3.5, 1.0, 3.0]);
    }

    #[test]
    fn impulse_at_center_of_mass_changes_only_linear_velocity() {
        let mut body = BodyBuilder::new()
            .with_mass(2.0)
            .with_shape(Shape::Sphere { radius: 1.0 })
            .build();
        body.apply_impulse(&Position::origin(), &vector![4.0, 0.0, 0.0]);
        assert_abs_diff_eq!(*body.velocity(), vector![2.0, 0.0, 0.0]);
        assert_abs_diff_eq!(*body.angular_velocity(), Vector3::zeros());
    }

    #[test]
    fn static_body_ignores_forces_and_integration() {
        let mut body = BodyBuilder::static_body().with_shape(Shape::Plane).build();
        body.apply_force(&point![1.0, 0.0, 0.0], &vector![0.0, 0.0, -10.0]);
        body.advance_velocities(&vector![0.0, 0.0, -9.82], 1.0);
        body.advance_configuration(1.0);
        assert_eq!(body.position(), &Position::origin());
        assert_eq!(body.velocity(), &Velocity::zeros());
    }

    #[test]
    fn damping_attenuates_velocities() {
        let mut body = BodyBuilder::new()
            .with_shape(Shape::Sphere { radius: 1.0 })
            .with_velocity(vector![1.0, 0.0, 0.0])
            .with_damping(0.5, 0.0)
            .build();
        body.advance_velocities(&Vector3::zeros(), 0.1);
        assert_abs_diff_eq!(body.velocity().x, 0.95, epsilon = 1e-12);
    }

    #[test]
    fn bounding_sphere_radius_covers_all_shapes() {
        let body = BodyBuilder::new()
            .with_shape(Shape::Sphere { radius: 1.0 })
            .with_offset_shape(
                ReferenceFrame::unoriented(point![2.0, 0.0, 0.0]),
                Shape::Sphere { radius: 0.5 },
            )
            .build();
        assert_abs_diff_eq!(body.bounding_sphere_radius(), 2.5);
    }
}
