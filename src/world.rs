//! The simulation world.

use crate::{
    body::{Body, BodyBuilder, BodyId},
    collision::{
        broad,
        narrow::{self, Collidable},
    },
    constraint::{
        contact::{ContactGeometry, ContactManifold, ContactWithId},
        solver::{ContactSolver, SolverConfig},
    },
    containers::KeyIndexMapper,
    fph,
    math::{Direction, Position},
    raycast::{self, Ray, RayHit},
};
use nalgebra::{Vector3, vector};

/// Configuration parameters for a [`World`].
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// The gravitational acceleration applied to every dynamic body.
    pub gravity: Vector3<fph>,
    /// Configuration for the contact solver.
    pub solver: SolverConfig,
}

/// A collection of rigid bodies advanced through discrete time steps.
///
/// Each [`Self::step`] integrates forces into velocities, generates contacts
/// between overlapping bodies, solves the contact constraints with
/// sequential impulses and integrates velocities into positions.
#[derive(Debug)]
pub struct World {
    bodies: Vec<Body>,
    body_index_map: KeyIndexMapper<BodyId>,
    body_id_counter: u32,
    gravity: Vector3<fph>,
    solver: ContactSolver,
    pairs: Vec<(BodyId, BodyId)>,
    contacts: Vec<(BodyId, BodyId, ContactWithId)>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: vector![0.0, 0.0, -9.82],
            solver: SolverConfig::default(),
        }
    }
}

impl World {
    /// Creates an empty world with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    /// Creates an empty world with the given configuration.
    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            bodies: Vec::new(),
            body_index_map: KeyIndexMapper::new(),
            body_id_counter: 0,
            gravity: config.gravity,
            solver: ContactSolver::new(config.solver),
            pairs: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// Sets the gravitational acceleration applied to every dynamic body.
    pub fn set_gravity(&mut self, gravity: Vector3<fph>) {
        self.gravity = gravity;
    }

    /// Returns the gravitational acceleration.
    pub fn gravity(&self) -> &Vector3<fph> {
        &self.gravity
    }

    /// Returns the contact solver configuration.
    pub fn solver_config(&self) -> &SolverConfig {
        self.solver.config()
    }

    /// Returns a mutable reference to the contact solver configuration.
    pub fn solver_config_mut(&mut self) -> &mut SolverConfig {
        self.solver.config_mut()
    }

    /// Builds the body described by the given builder and adds it to the
    /// world.
    ///
    /// # Returns
    /// A new [`BodyId`] referring to the added body. Ids are monotonically
    /// increasing and never reused.
    pub fn add_body(&mut self, builder: BodyBuilder) -> BodyId {
        let id = BodyId(self.body_id_counter);
        self.body_id_counter = self.body_id_counter.checked_add(1).unwrap();

        self.bodies.push(builder.build());
        self.body_index_map.push_key(id);

        id
    }

    /// Removes the body with the given id from the world if it exists.
    pub fn remove_body(&mut self, id: BodyId) {
        if let Some(idx) = self.body_index_map.try_swap_remove_key(id) {
            self.bodies.swap_remove(idx);
        }
    }

    /// Returns a reference to the body with the given id, or [`None`] if it
    /// does not exist.
    pub fn get_body(&self, id: BodyId) -> Option<&Body> {
        let idx = self.body_index_map.get(id)?;
        Some(&self.bodies[idx])
    }

    /// Returns a mutable reference to the body with the given id, or
    /// [`None`] if it does not exist. This is the way to apply forces and
    /// impulses to a body between steps.
    pub fn get_body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        let idx = self.body_index_map.get(id)?;
        Some(&mut self.bodies[idx])
    }

    /// The number of bodies in the world.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Returns an iterator over all bodies with their ids, in insertion
    /// order.
    pub fn iter_bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.body_index_map.key_at_each_idx().zip(self.bodies.iter())
    }

    /// Calls the given closure with each contact generated in the most
    /// recent step, for debug overlays. Not part of the simulation contract.
    pub fn for_each_contact(&self, mut f: impl FnMut(BodyId, BodyId, &ContactGeometry)) {
        for (body_a_id, body_b_id, contact) in &self.contacts {
            f(*body_a_id, *body_b_id, &contact.contact.geometry);
        }
    }

    /// Advances the simulation by the given time step. A step duration of
    /// zero or less is a no-op.
    pub fn step(&mut self, step_duration: fph) {
        if step_duration <= 0.0 {
            return;
        }

        for body in &mut self.bodies {
            body.refresh_inverse_world_inertia();
            body.advance_velocities(&self.gravity, step_duration);
        }

        self.collect_pairs();
        self.generate_contacts();

        log::trace!(
            "Solving {} contacts from {} candidate pairs",
            self.contacts.len(),
            self.pairs.len()
        );

        self.solve_contacts(step_duration);

        for body in &mut self.bodies {
            body.advance_configuration(step_duration);
            body.reset_force_and_torque();
        }
    }

    /// Computes the nearest intersection of the given ray with any shape of
    /// any body. Returns [`None`] if nothing is hit or the direction has
    /// (almost) zero length.
    pub fn raycast(&self, from: Position, direction: Vector3<fph>) -> Option<RayHit> {
        let direction = raycast::normalize_ray_direction(direction)?;
        let ray = Ray::new(from, direction);

        let mut nearest: Option<RayHit> = None;

        for (body_id, body) in self.iter_bodies() {
            if !ray.passes_within(body.position(), body.bounding_sphere_radius()) {
                continue;
            }

            let body_frame = body.frame();
            for body_shape in body.shapes() {
                let shape_frame = body_shape.world_frame(&body_frame);
                let local_ray = ray.to_frame(&shape_frame);

                if let Some(hit) = raycast::ray_shape_intersection(&local_ray, &body_shape.shape) {
                    if nearest
                        .as_ref()
                        .is_none_or(|best| hit.distance < best.distance)
                    {
                        nearest = Some(RayHit {
                            body_id,
                            distance: hit.distance,
                            point: shape_frame.transform_point(&hit.point),
                            normal: Direction::new_unchecked(
                                shape_frame.transform_vector(&hit.normal),
                            ),
                        });
                    }
                }
            }
        }

        nearest
    }

    fn collect_pairs(&mut self) {
        let entries: Vec<(BodyId, &Body)> = self
            .body_index_map
            .key_at_each_idx()
            .zip(self.bodies.iter())
            .collect();
        self.pairs = broad::collect_candidate_pairs(&entries);
    }

    fn generate_contacts(&mut self) {
        self.contacts.clear();
        let mut manifold = ContactManifold::new();

        for &(body_a_id, body_b_id) in &self.pairs {
            let body_a = &self.bodies[self.body_index_map.get(body_a_id).unwrap()];
            let body_b = &self.bodies[self.body_index_map.get(body_b_id).unwrap()];

            let body_a_frame = body_a.frame();
            let body_b_frame = body_b.frame();

            for (shape_a_idx, body_shape_a) in body_a.shapes().iter().enumerate() {
                for (shape_b_idx, body_shape_b) in body_b.shapes().iter().enumerate() {
                    let collidable_a = Collidable {
                        body_id: body_a_id,
                        shape_index: shape_a_idx,
                        frame: body_shape_a.world_frame(&body_a_frame),
                        shape: &body_shape_a.shape,
                        material: body_a.material(),
                    };
                    let collidable_b = Collidable {
                        body_id: body_b_id,
                        shape_index: shape_b_idx,
                        frame: body_shape_b.world_frame(&body_b_frame),
                        shape: &body_shape_b.shape,
                        material: body_b.material(),
                    };

                    narrow::generate_shape_contacts(&collidable_a, &collidable_b, &mut manifold);

                    if !manifold.is_empty() {
                        for contact in manifold.contacts() {
                            self.contacts.push((body_a_id, body_b_id, contact.clone()));
                        }
                        manifold.clear();
                    }
                }
            }
        }
    }

    fn solve_contacts(&mut self, step_duration: fph) {
        self.solver.clear_prepared_bodies();

        let inverse_step_duration = 1.0 / step_duration;
        for (body_a_id, body_b_id, contact) in &self.contacts {
            let body_a = &self.bodies[self.body_index_map.get(*body_a_id).unwrap()];
            let body_b = &self.bodies[self.body_index_map.get(*body_b_id).unwrap()];
            self.solver.prepare_contact(
                *body_a_id,
                body_a,
                *body_b_id,
                body_b,
                contact,
                inverse_step_duration,
            );
        }

        self.solver.remove_unprepared_constraints();
        self.solver.compute_constrained_velocities();

        let bodies = &mut self.bodies;
        let body_index_map = &self.body_index_map;
        self.solver.for_each_solved_body(&mut |body_id, solved| {
            if let Some(idx) = body_index_map.get(body_id) {
                bodies[idx].set_velocities(solved.velocity, solved.angular_velocity);
            }
        });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
