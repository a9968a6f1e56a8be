//! Contact (collision) constraints.

use super::{ConstrainedBody, solver::SolverConfig};
use crate::{
    body::{BodyId, Material},
    fph,
    math::{Direction, Position},
};
use nalgebra::{Vector3, vector};
use num_traits::Zero;
use std::ops::{Add, Mul, Sub};
use tinyvec::TinyVec;

/// Factor limiting the separation speed the position-feedback bias may
/// request, as a fraction of the inverse step duration.
const BIAS_SPEED_CAP_FACTOR: fph = 0.2;

/// A set of contact points representing the region where two bodies are in
/// contact.
#[derive(Clone, Debug, Default)]
pub struct ContactManifold {
    contacts: TinyVec<[ContactWithId; 4]>,
}

/// A contact between two bodies together with its identifier.
#[derive(Clone, Debug)]
pub struct ContactWithId {
    /// Identifier for the contact, stable across steps as long as the
    /// touching features remain the same.
    pub id: ContactId,
    pub contact: Contact,
}

/// A point of contact between two bodies.
#[derive(Clone, Debug, Default)]
pub struct Contact {
    /// The geometrical information about the contact.
    pub geometry: ContactGeometry,
    /// The combined material for the contact.
    pub material: Material,
}

/// Identifier for a [`Contact`], derived from the involved body pair and the
/// indices of the touching shape features.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId(u64);

/// Geometrical information about a point of contact between two bodies A
/// and B.
#[derive(Clone, Debug)]
pub struct ContactGeometry {
    /// The world space contact point, on the surface of body B.
    pub position: Position,
    /// The world space contact normal, pointing from body A toward body B.
    pub normal: Direction,
    /// How deep the bodies penetrate each other along the normal; always
    /// non-negative when the bodies are in contact.
    pub penetration_depth: fph,
}

/// Derived information about a contact needed for solving the perpendicular
/// (non-penetration) and tangential (friction) velocity constraints.
#[derive(Clone, Debug)]
pub(crate) struct PreparedContact {
    /// Displacement from the center of mass of body A to the contact point.
    disp_a: Vector3<fph>,
    /// Displacement from the center of mass of body B to the contact point.
    disp_b: Vector3<fph>,
    normal: Direction,
    tangent: Direction,
    bitangent: Direction,
    effective_mass_normal: fph,
    effective_mass_tangent: fph,
    effective_mass_bitangent: fph,
    friction_coef: fph,
    /// Velocity bias on the normal constraint: the restitution target from
    /// the pre-solve approach speed plus the capped position-feedback term.
    bias: fph,
}

/// Accumulated impulses along the three axes of the surface-aligned
/// coordinate system of a contact.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactImpulses {
    pub normal: fph,
    pub tangent: fph,
    pub bitangent: fph,
}

impl ContactManifold {
    pub fn new() -> Self {
        Self {
            contacts: TinyVec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn contacts(&self) -> &[ContactWithId] {
        self.contacts.as_slice()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    pub fn add_contact(&mut self, contact: ContactWithId) {
        self.contacts.push(contact);
    }
}

impl Default for ContactWithId {
    fn default() -> Self {
        Self {
            id: ContactId(u64::MAX),
            contact: Contact::default(),
        }
    }
}

impl ContactId {
    /// Creates the base identifier for contacts between the given pair of
    /// bodies.
    pub fn from_bodies(body_a: BodyId, body_b: BodyId) -> Self {
        Self((u64::from(body_a.0) << 32) | u64::from(body_b.0))
    }

    /// Mixes the given feature index into the identifier.
    pub fn mixed_with_index(self, index: usize) -> Self {
        Self(self.0.wrapping_mul(31).wrapping_add(index as u64))
    }
}

impl Default for ContactGeometry {
    fn default() -> Self {
        Self {
            position: Position::origin(),
            normal: Vector3::z_axis(),
            penetration_depth: 0.0,
        }
    }
}

impl ContactGeometry {
    /// Returns the geometry of the same contact with the roles of body A and
    /// body B exchanged.
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

impl PreparedContact {
    /// Precomputes the constraint rows for the given contact between the
    /// given bodies, whose velocities have already been advanced by the
    /// non-constraint forces for this step.
    pub(crate) fn prepare(
        body_a: &ConstrainedBody,
        body_b: &ConstrainedBody,
        contact: &Contact,
        inverse_step_duration: fph,
        config: &SolverConfig,
    ) -> Self {
        let geometry = &contact.geometry;

        let disp_a = geometry.position - body_a.position;
        let disp_b = geometry.position - body_b.position;

        let normal = geometry.normal;
        let (tangent, bitangent) = contact_tangent_basis(&normal);

        let row_mass = |direction: &Direction| {
            (body_a.inverse_effective_mass_along(&disp_a, direction)
                + body_b.inverse_effective_mass_along(&disp_b, direction))
            .recip()
        };

        let effective_mass_normal = row_mass(&normal);
        let effective_mass_tangent = row_mass(&tangent);
        let effective_mass_bitangent = row_mass(&bitangent);

        // Velocity at which the surfaces separate before solving; negative
        // when the bodies approach each other
        let relative_velocity =
            body_b.point_velocity(&disp_b) - body_a.point_velocity(&disp_a);
        let separating_velocity = normal.dot(&relative_velocity);

        let restitution_bias =
            contact.material.restitution * fph::min(separating_velocity, 0.0);

        let position_feedback = fph::min(
            config.baumgarte_factor
                * fph::max(0.0, geometry.penetration_depth - config.penetration_slop),
            BIAS_SPEED_CAP_FACTOR,
        ) * inverse_step_duration;

        Self {
            disp_a,
            disp_b,
            normal,
            tangent,
            bitangent,
            effective_mass_normal,
            effective_mass_tangent,
            effective_mass_bitangent,
            friction_coef: contact.material.friction,
            bias: restitution_bias - position_feedback,
        }
    }

    /// Whether the accumulated impulses from the other prepared contact can
    /// be used to kick-start the solution of this contact. It is assumed
    /// that the other contact involves the same bodies.
    pub(crate) fn can_use_warm_impulses_from(&self, other: &Self) -> bool {
        // `max_deviation_angle = acos(1 - threshold)`
        const THRESHOLD: fph = 1e-2;

        let normal_matches = self.normal.dot(&other.normal) > 1.0 - THRESHOLD;

        // We also need to check one of the tangent directions in case a
        // small deviation in the normal has caused the tangents to flip
        let tangent_matches = self.tangent.dot(&other.tangent) > 1.0 - THRESHOLD;

        normal_matches && tangent_matches
    }

    /// Computes the corrective impulses that would make the current
    /// velocities of the bodies satisfy the constraints as equalities. No
    /// clamping is performed here.
    pub(crate) fn compute_impulses(
        &self,
        body_a: &ConstrainedBody,
        body_b: &ConstrainedBody,
    ) -> ContactImpulses {
        let relative_velocity =
            body_b.point_velocity(&self.disp_b) - body_a.point_velocity(&self.disp_a);

        let separating_velocity = self.normal.dot(&relative_velocity);

        ContactImpulses {
            normal: -self.effective_mass_normal * (separating_velocity + self.bias),
            tangent: -self.effective_mass_tangent * self.tangent.dot(&relative_velocity),
            bitangent: -self.effective_mass_bitangent * self.bitangent.dot(&relative_velocity),
        }
    }

    /// Clamps the given accumulated impulses to satisfy the inequality
    /// constraints: the normal impulse can only push the bodies apart, and
    /// the tangential impulse is confined to the Coulomb disc whose radius
    /// is set by the current normal impulse.
    pub(crate) fn clamp_impulses(&self, impulses: ContactImpulses) -> ContactImpulses {
        let clamped_normal_impulse = fph::max(0.0, impulses.normal);

        let max_tangent_impulse_magnitude = self.friction_coef * clamped_normal_impulse;

        let tangent_impulse_magnitude =
            fph::sqrt(impulses.tangent.powi(2) + impulses.bitangent.powi(2));

        let tangent_impulse_scaling = if tangent_impulse_magnitude > max_tangent_impulse_magnitude
        {
            max_tangent_impulse_magnitude / tangent_impulse_magnitude
        } else {
            1.0
        };

        ContactImpulses {
            normal: clamped_normal_impulse,
            tangent: impulses.tangent * tangent_impulse_scaling,
            bitangent: impulses.bitangent * tangent_impulse_scaling,
        }
    }

    /// Applies the given impulses to the velocities of the two bodies: body
    /// B receives the impulse along the contact normal and body A its
    /// opposite.
    pub(crate) fn apply_impulses_to_body_pair(
        &self,
        body_a: &mut ConstrainedBody,
        body_b: &mut ConstrainedBody,
        impulses: ContactImpulses,
    ) {
        let momentum_change = self.normal.scale(impulses.normal)
            + self.tangent.scale(impulses.tangent)
            + self.bitangent.scale(impulses.bitangent);

        body_a.velocity -= body_a.inverse_mass * momentum_change;
        body_a.angular_velocity -=
            body_a.inverse_inertia_tensor * self.disp_a.cross(&momentum_change);

        body_b.velocity += body_b.inverse_mass * momentum_change;
        body_b.angular_velocity +=
            body_b.inverse_inertia_tensor * self.disp_b.cross(&momentum_change);
    }
}

impl Zero for ContactImpulses {
    fn zero() -> Self {
        Self {
            normal: 0.0,
            tangent: 0.0,
            bitangent: 0.0,
        }
    }

    fn is_zero(&self) -> bool {
        self.normal == 0.0 && self.tangent == 0.0 && self.bitangent == 0.0
    }
}

impl Add for ContactImpulses {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            normal: self.normal + rhs.normal,
            tangent: self.tangent + rhs.tangent,
            bitangent: self.bitangent + rhs.bitangent,
        }
    }
}

impl Sub for ContactImpulses {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            normal: self.normal - rhs.normal,
            tangent: self.tangent - rhs.tangent,
            bitangent: self.bitangent - rhs.bitangent,
        }
    }
}

impl Mul<fph> for ContactImpulses {
    type Output = Self;

    fn mul(self, rhs: fph) -> Self::Output {
        Self {
            normal: self.normal * rhs,
            tangent: self.tangent * rhs,
            bitangent: self.bitangent * rhs,
        }
    }
}

/// Constructs two unit vectors that complete a right-handed orthonormal
/// basis with the given surface normal, using the branchless construction
/// of Duff et al. (2017). The basis is a deterministic function of the
/// normal, which keeps the friction directions stable across steps for
/// warm starting.
fn contact_tangent_basis(surface_normal: &Direction) -> (Direction, Direction) {
    let sign = fph::copysign(1.0, surface_normal.z);
    let a = -1.0 / (sign + surface_normal.z);
    let b = surface_normal.x * surface_normal.y * a;

    let tangent = Direction::new_unchecked(vector![
        1.0 + sign * surface_normal.x * surface_normal.x * a,
        sign * b,
        -sign * surface_normal.x
    ]);
    let bitangent = Direction::new_unchecked(vector![
        b,
        sign + surface_normal.y * surface_normal.y * a,
        -surface_normal.y
    ]);

    (tangent, bitangent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Velocity;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix3, point};
    use proptest::prelude::*;

    fn stationary_unit_body_at(position: Position) -> ConstrainedBody {
        ConstrainedBody {
            inverse_mass: 1.0,
            inverse_inertia_tensor: Matrix3::identity(),
            position,
            velocity: Velocity::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }

    fn head_on_contact(restitution: fph, friction: fph) -> Contact {
        Contact {
            geometry: ContactGeometry {
                position: point![1.0, 0.0, 0.0],
                normal: Vector3::x_axis(),
                penetration_depth: 0.0,
            },
            material: Material {
                friction,
                restitution,
            },
        }
    }

    proptest! {
        #[test]
        fn tangent_vectors_form_right_handed_orthonormal_basis(
            x in -1.0..1.0_f64,
            y in -1.0..1.0_f64,
            z in -1.0..1.0_f64,
        ) {
            prop_assume!(x.abs() + y.abs() + z.abs() > 1e-3);
            let normal = Direction::new_normalize(vector![x, y, z]);
            let (tangent, bitangent) = contact_tangent_basis(&normal);

            prop_assert!(normal.dot(&tangent).abs() < 1e-12);
            prop_assert!(normal.dot(&bitangent).abs() < 1e-12);
            prop_assert!(tangent.dot(&bitangent).abs() < 1e-12);
            prop_assert!((tangent.cross(&bitangent) - normal.into_inner()).norm() < 1e-12);
        }
    }

    #[test]
    fn approaching_bodies_get_separating_normal_impulse() {
        let mut body_a = stationary_unit_body_at(Position::origin());
        body_a.velocity = vector![1.0, 0.0, 0.0];
        let body_b = stationary_unit_body_at(point![2.0, 0.0, 0.0]);

        let prepared = PreparedContact::prepare(
            &body_a,
            &body_b,
            &head_on_contact(0.0, 0.0),
            60.0,
            &SolverConfig::default(),
        );

        let impulses = prepared.compute_impulses(&body_a, &body_b);
        assert!(impulses.normal > 0.0);
        assert_abs_diff_eq!(impulses.tangent, 0.0);
        assert_abs_diff_eq!(impulses.bitangent, 0.0);
    }

    #[test]
    fn separating_bodies_get_no_impulse_after_clamping() {
        let mut body_a = stationary_unit_body_at(Position::origin());
        body_a.velocity = vector![-1.0, 0.0, 0.0];
        let body_b = stationary_unit_body_at(point![2.0, 0.0, 0.0]);

        let prepared = PreparedContact::prepare(
            &body_a,
            &body_b,
            &head_on_contact(0.0, 0.0),
            60.0,
            &SolverConfig::default(),
        );

        let impulses = prepared.compute_impulses(&body_a, &body_b);
        let clamped = prepared.clamp_impulses(impulses);
        assert_abs_diff_eq!(clamped.normal, 0.0);
    }

    #[test]
    fn friction_impulse_is_confined_to_coulomb_disc() {
        let body_a = stationary_unit_body_at(Position::origin());
        let body_b = stationary_unit_body_at(point![2.0, 0.0, 0.0]);

        let prepared = PreparedContact::prepare(
            &body_a,
            &body_b,
            &head_on_contact(0.0, 0.5),
            60.0,
            &SolverConfig::default(),
        );

        let clamped = prepared.clamp_impulses(ContactImpulses {
            normal: 2.0,
            tangent: 3.0,
            bitangent: -4.0,
        });

        assert_abs_diff_eq!(clamped.normal, 2.0);
        let tangent_magnitude =
            fph::sqrt(clamped.tangent.powi(2) + clamped.bitangent.powi(2));
        assert_abs_diff_eq!(tangent_magnitude, 1.0, epsilon = 1e-12);
        // The direction of sliding is preserved
        assert_abs_diff_eq!(clamped.tangent / clamped.bitangent, -0.75, epsilon = 1e-12);
    }

    #[test]
    fn applied_impulses_conserve_momentum() {
        let mut body_a = stationary_unit_body_at(Position::origin());
        body_a.velocity = vector![1.0, 0.0, 0.0];
        let mut body_b = stationary_unit_body_at(point![2.0, 0.0, 0.0]);

        let prepared = PreparedContact::prepare(
            &body_a,
            &body_b,
            &head_on_contact(1.0, 0.0),
            60.0,
            &SolverConfig::default(),
        );

        let momentum_before = body_a.velocity + body_b.velocity;
        let impulses = prepared.compute_impulses(&body_a, &body_b);
        prepared.apply_impulses_to_body_pair(&mut body_a, &mut body_b, impulses);
        let momentum_after = body_a.velocity + body_b.velocity;

        assert_abs_diff_eq!(momentum_before, momentum_after, epsilon = 1e-12);
    }

    #[test]
    fn restitution_reverses_approach_speed() {
        let mut body_a = stationary_unit_body_at(Position::origin());
        body_a.velocity = vector![1.0, 0.0, 0.0];
        let mut body_b = stationary_unit_body_at(point![2.0, 0.0, 0.0]);
        body_b.velocity = vector![-1.0, 0.0, 0.0];

        let prepared = PreparedContact::prepare(
            &body_a,
            &body_b,
            &head_on_contact(1.0, 0.0),
            60.0,
            &SolverConfig::default(),
        );

        let impulses = prepared.compute_impulses(&body_a, &body_b);
        prepared.apply_impulses_to_body_pair(&mut body_a, &mut body_b, impulses);

        // Fully elastic head-on collision of equal masses: velocities swap
        assert_abs_diff_eq!(body_a.velocity, vector![-1.0, 0.0, 0.0], epsilon = 1e-12);
        assert_abs_diff_eq!(body_b.velocity, vector![1.0, 0.0, 0.0], epsilon = 1e-12);
    }

    #[test]
    fn static_body_velocities_are_unaffected() {
        let mut body_a = stationary_unit_body_at(Position::origin());
        body_a.velocity = vector![1.0, 0.0, 0.0];
        let mut body_b = ConstrainedBody {
            inverse_mass: 0.0,
            inverse_inertia_tensor: Matrix3::zeros(),
            position: point![2.0, 0.0, 0.0],
            velocity: Velocity::zeros(),
            angular_velocity: Vector3::zeros(),
        };

        let prepared = PreparedContact::prepare(
            &body_a,
            &body_b,
            &head_on_contact(1.0, 0.0),
            60.0,
            &SolverConfig::default(),
        );

        let impulses = prepared.compute_impulses(&body_a, &body_b);
        prepared.apply_impulses_to_body_pair(&mut body_a, &mut body_b, impulses);

        assert_eq!(body_b.velocity, Velocity::zeros());
        assert_eq!(body_b.angular_velocity, Vector3::zeros());
        // Elastic bounce off an immovable body inverts the velocity
        assert_abs_diff_eq!(body_a.velocity, vector![-1.0, 0.0, 0.0], epsilon = 1e-12);
    }
}
