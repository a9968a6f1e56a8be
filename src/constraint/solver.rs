//! Constraint solving based on the sequential impulse method.

use super::{
    ConstrainedBody,
    contact::{ContactId, ContactImpulses, ContactWithId, PreparedContact},
};
use crate::{
    body::{Body, BodyId},
    containers::KeyIndexMapper,
    fph,
};
use bitflags::bitflags;
use num_traits::Zero;
use std::ops::Deref;

/// A Sequential Impulse solver for contact constraints.
#[derive(Clone, Debug)]
pub(crate) struct ContactSolver {
    bodies: Vec<ConstrainedBody>,
    body_index_map: KeyIndexMapper<BodyId>,
    contacts: Vec<BodyPairConstraint>,
    contact_index_map: KeyIndexMapper<ContactId>,
    config: SolverConfig,
}

/// Configuration parameters for the contact solver.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// The number of sequential impulse iterations to perform for solving
    /// the velocity constraints.
    pub n_iterations: u32,
    /// How to scale the still-valid accumulated impulses from the previous
    /// step before using them as the initial impulses for the current step.
    /// Set to zero to disable warm starting.
    pub warm_start_weight: fph,
    /// The fraction of the current penetration error fed back into the
    /// normal velocity constraint (Baumgarte stabilization).
    pub baumgarte_factor: fph,
    /// Penetration depth below which no position feedback is applied.
    pub penetration_slop: fph,
}

/// Wrapper for a prepared contact constraint that tracks the indices of the
/// involved [`ConstrainedBody`]s in the solver and the current accumulated
/// impulses.
#[derive(Clone, Debug)]
struct BodyPairConstraint {
    body_a_idx: usize,
    body_b_idx: usize,
    constraint: PreparedContact,
    accumulated_impulses: ContactImpulses,
    flags: ConstraintFlags,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ConstraintFlags: u8 {
        /// Whether this constraint was prepared for use in the current step.
        const WAS_PREPARED = 1 << 0;
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            n_iterations: 10,
            warm_start_weight: 1.0,
            baumgarte_factor: 0.2,
            penetration_slop: 0.01,
        }
    }
}

impl ContactSolver {
    pub(crate) fn new(config: SolverConfig) -> Self {
        Self {
            bodies: Vec::new(),
            body_index_map: KeyIndexMapper::new(),
            contacts: Vec::new(),
            contact_index_map: KeyIndexMapper::new(),
            config,
        }
    }

    pub(crate) fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    pub(crate) fn prepared_contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub(crate) fn prepared_body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Clears all constrained bodies cached from the previous solve. This
    /// should always be done before starting to prepare contacts for the
    /// next solve.
    pub(crate) fn clear_prepared_bodies(&mut self) {
        self.bodies.clear();
        self.body_index_map.clear();
    }

    /// Prepares the given contact between the given bodies for solution,
    /// caching the current state of the bodies. Accumulated impulses from a
    /// matching contact in the previous solve are carried over (scaled by
    /// the warm start weight) if the contact geometry is still compatible.
    pub(crate) fn prepare_contact(
        &mut self,
        body_a_id: BodyId,
        body_a: &Body,
        body_b_id: BodyId,
        body_b: &Body,
        contact: &ContactWithId,
        inverse_step_duration: fph,
    ) {
        let body_a_idx = self.prepare_body(body_a_id, body_a);
        let body_b_idx = self.prepare_body(body_b_id, body_b);

        let prepared = PreparedContact::prepare(
            &self.bodies[body_a_idx],
            &self.bodies[body_b_idx],
            &contact.contact,
            inverse_step_duration,
            &self.config,
        );

        let constraint = BodyPairConstraint {
            body_a_idx,
            body_b_idx,
            constraint: prepared,
            accumulated_impulses: Zero::zero(),
            flags: ConstraintFlags::WAS_PREPARED,
        };

        if let Some(idx) = self.contact_index_map.get(contact.id) {
            // We know this contact from the previous solve. If the geometry
            // has not changed significantly, the impulses obtained from the
            // previous solve are likely still close to the solution, so we
            // use them as the initial guess, with a weight to mitigate
            // overshoot
            let old_constraint = &self.contacts[idx];
            let accumulated_impulses =
                if constraint.can_use_warm_impulses_from(old_constraint) {
                    old_constraint.accumulated_impulses * self.config.warm_start_weight
                } else {
                    Zero::zero()
                };
            self.contacts[idx] = BodyPairConstraint {
                accumulated_impulses,
                ..constraint
            };
        } else {
            self.contacts.push(constraint);
            self.contact_index_map.push_key(contact.id);
        }
    }

    /// Removes any contacts cached from the previous solve that have not
    /// been re-prepared for the next solve. This should always be called
    /// after preparing all active contacts and before
    /// [`Self::compute_constrained_velocities`].
    pub(crate) fn remove_unprepared_constraints(&mut self) {
        let mut idx = 0;
        let mut len = self.contacts.len();
        while idx < len {
            let constraint = &mut self.contacts[idx];
            if constraint.flags.contains(ConstraintFlags::WAS_PREPARED) {
                constraint.flags.remove(ConstraintFlags::WAS_PREPARED);
                idx += 1;
            } else {
                self.contacts.swap_remove(idx);
                self.contact_index_map.swap_remove_key_at_idx(idx);
                len -= 1;
            }
        }
    }

    /// Tries to solve all prepared velocity constraints: for a fixed number
    /// of iterations, go through each contact, compute the impulses that
    /// would make the velocities of the involved bodies satisfy that
    /// constraint in isolation, clamp the accumulated impulses and update
    /// the velocities with the clamped difference. To speed up convergence,
    /// the surviving impulses from the previous solve are applied to the
    /// bodies before starting.
    pub(crate) fn compute_constrained_velocities(&mut self) {
        for constraint in &self.contacts {
            let (body_a, body_b) = two_mutable_elements(
                &mut self.bodies,
                constraint.body_a_idx,
                constraint.body_b_idx,
            );

            // The warm impulses from the previous solve are the initial
            // guess for this solve, so they must be pre-applied to the
            // bodies before we begin
            constraint.apply_impulses_to_body_pair(
                body_a,
                body_b,
                constraint.accumulated_impulses,
            );
        }

        for _ in 0..self.config.n_iterations {
            for constraint in &mut self.contacts {
                let (body_a, body_b) = two_mutable_elements(
                    &mut self.bodies,
                    constraint.body_a_idx,
                    constraint.body_b_idx,
                );

                let corrective_impulses = constraint.compute_impulses(body_a, body_b);

                // The accumulated impulses are what would have to be applied
                // to the pre-solve velocities to satisfy the constraints as
                // inequalities, so the clamping happens on those rather than
                // on the per-iteration corrections
                let old_accumulated_impulses = constraint.accumulated_impulses;
                constraint.accumulated_impulses = constraint
                    .clamp_impulses(constraint.accumulated_impulses + corrective_impulses);

                let clamped_corrective_impulses =
                    constraint.accumulated_impulses - old_accumulated_impulses;

                constraint.apply_impulses_to_body_pair(
                    body_a,
                    body_b,
                    clamped_corrective_impulses,
                );
            }
        }
    }

    /// Calls the given closure with the solved velocities of each prepared
    /// body.
    pub(crate) fn for_each_solved_body(&self, f: &mut impl FnMut(BodyId, &ConstrainedBody)) {
        for (body_id, body) in self.body_index_map.key_at_each_idx().zip(&self.bodies) {
            f(body_id, body);
        }
    }

    /// Removes all stored solver state.
    pub(crate) fn clear(&mut self) {
        self.clear_prepared_bodies();
        self.contacts.clear();
        self.contact_index_map.clear();
    }

    fn prepare_body(&mut self, body_id: BodyId, body: &Body) -> usize {
        if let Some(body_idx) = self.body_index_map.get(body_id) {
            return body_idx;
        }

        let body_idx = self.bodies.len();
        self.bodies.push(ConstrainedBody::from_body(body));
        self.body_index_map.push_key(body_id);

        body_idx
    }
}

impl Deref for BodyPairConstraint {
    type Target = PreparedContact;

    fn deref(&self) -> &Self::Target {
        &self.constraint
    }
}

fn two_mutable_elements<T>(
    values: &mut [T],
    idx_a: usize,
    idx_b: usize,
) -> (&mut T, &mut T) {
    assert_ne!(idx_a, idx_b);

    if idx_b > idx_a {
        let (left, right) = values.split_at_mut(idx_b);
        (&mut left[idx_a], &mut right[0])
    } else {
        let (left, right) = values.split_at_mut(idx_a);
        (&mut right[0], &mut left[idx_b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::{BodyBuilder, Material},
        constraint::contact::{Contact, ContactGeometry},
        shape::Shape,
    };
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector3, point, vector};

    const INVERSE_STEP_DURATION: fph = 60.0;

    fn approaching_spheres() -> (Body, Body) {
        let body_a = BodyBuilder::new()
            .with_velocity(vector![1.0, 0.0, 0.0])
            .with_shape(Shape::Sphere { radius: 1.0 })
            .build();
        let body_b = BodyBuilder::new()
            .with_position(point![2.0, 0.0, 0.0])
            .with_shape(Shape::Sphere { radius: 1.0 })
            .build();
        (body_a, body_b)
    }

    fn touching_contact(restitution: fph) -> ContactWithId {
        ContactWithId {
            id: ContactId::from_bodies(BodyId(0), BodyId(1)),
            contact: Contact {
                geometry: ContactGeometry {
                    position: point![1.0, 0.0, 0.0],
                    normal: Vector3::x_axis(),
                    penetration_depth: 0.0,
                },
                material: Material::new(0.0, restitution),
            },
        }
    }

    #[test]
    fn preparing_a_contact_caches_both_bodies_once() {
        let (body_a, body_b) = approaching_spheres();
        let mut solver = ContactSolver::new(SolverConfig::default());

        solver.clear_prepared_bodies();
        let contact = touching_contact(1.0);
        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &contact,
            INVERSE_STEP_DURATION,
        );
        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &ContactWithId {
                id: contact.id.mixed_with_index(1),
                ..contact.clone()
            },
            INVERSE_STEP_DURATION,
        );

        assert_eq!(solver.prepared_contact_count(), 2);
        assert_eq!(solver.prepared_body_count(), 2);
    }

    #[test]
    fn solving_elastic_contact_swaps_velocities() {
        let (body_a, body_b) = approaching_spheres();
        let mut solver = ContactSolver::new(SolverConfig::default());

        solver.clear_prepared_bodies();
        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &touching_contact(1.0),
            INVERSE_STEP_DURATION,
        );
        solver.remove_unprepared_constraints();
        solver.compute_constrained_velocities();

        solver.for_each_solved_body(&mut |body_id, solved| match body_id {
            BodyId(0) => {
                assert_abs_diff_eq!(solved.velocity, vector![0.0, 0.0, 0.0], epsilon = 1e-9);
            }
            BodyId(1) => {
                assert_abs_diff_eq!(solved.velocity, vector![1.0, 0.0, 0.0], epsilon = 1e-9);
            }
            _ => panic!("unexpected body"),
        });
    }

    #[test]
    fn contacts_not_prepared_again_are_evicted() {
        let (body_a, body_b) = approaching_spheres();
        let mut solver = ContactSolver::new(SolverConfig::default());

        solver.clear_prepared_bodies();
        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &touching_contact(0.0),
            INVERSE_STEP_DURATION,
        );
        solver.remove_unprepared_constraints();
        assert_eq!(solver.prepared_contact_count(), 1);

        // Next solve: the bodies have separated and the contact is gone
        solver.clear_prepared_bodies();
        solver.remove_unprepared_constraints();
        assert_eq!(solver.prepared_contact_count(), 0);
    }

    #[test]
    fn warm_started_contact_carries_over_scaled_impulses() {
        let (body_a, body_b) = approaching_spheres();
        let mut solver = ContactSolver::new(SolverConfig {
            warm_start_weight: 0.5,
            ..Default::default()
        });

        let contact = touching_contact(0.0);

        solver.clear_prepared_bodies();
        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &contact,
            INVERSE_STEP_DURATION,
        );
        solver.remove_unprepared_constraints();
        solver.compute_constrained_velocities();

        let accumulated_normal_impulse = solver.contacts[0].accumulated_impulses.normal;
        assert!(accumulated_normal_impulse > 0.0);

        // Re-prepare the same contact with unchanged geometry
        solver.clear_prepared_bodies();
        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &contact,
            INVERSE_STEP_DURATION,
        );
        assert_abs_diff_eq!(
            solver.contacts[0].accumulated_impulses.normal,
            0.5 * accumulated_normal_impulse,
            epsilon = 1e-12
        );
    }

    #[test]
    fn clearing_discards_all_cached_state() {
        let (body_a, body_b) = approaching_spheres();
        let mut solver = ContactSolver::new(SolverConfig::default());

        solver.prepare_contact(
            BodyId(0),
            &body_a,
            BodyId(1),
            &body_b,
            &touching_contact(0.0),
            INVERSE_STEP_DURATION,
        );
        solver.clear();
        assert_eq!(solver.prepared_contact_count(), 0);
        assert_eq!(solver.prepared_body_count(), 0);
    }

    #[test]
    fn two_mutable_elements_resolves_both_orders() {
        let mut values = vec![1, 2, 3, 4];

        let (a, b) = two_mutable_elements(&mut values, 0, 3);
        assert_eq!((*a, *b), (1, 4));

        let (a, b) = two_mutable_elements(&mut values, 3, 0);
        assert_eq!((*a, *b), (4, 1));
    }

    #[test]
    #[should_panic]
    fn two_mutable_elements_rejects_equal_indices() {
        let mut values = vec![1, 2];
        let _ = two_mutable_elements(&mut values, 1, 1);
    }
}
