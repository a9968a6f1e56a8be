//! Simulation of rigid-body dynamics.
//!
//! The crate advances a [`World`] of rigid bodies through discrete time
//! steps: forces are integrated into velocities, overlapping body pairs are
//! found and their exact contact points generated, the resulting
//! non-penetration and friction constraints are solved with sequential
//! impulses, and finally positions and orientations are advanced.
//!
//! Shapes are a closed set of tagged variants ([`Shape`]): the infinite
//! plane, the sphere and the convex polyhedron ([`ConvexHull`]), the latter
//! buildable from a closed triangle mesh or from analytic primitives.

pub mod body;
pub mod collision;
pub mod constraint;
pub mod containers;
pub mod geometry;
pub mod inertia;
pub mod math;
pub mod raycast;
pub mod shape;
pub mod transform;
pub mod world;

pub use body::{Body, BodyBuilder, BodyId, Material};
pub use constraint::solver::SolverConfig;
pub use geometry::{AxisAlignedBox, ConvexHull, Face, HullError, Plane, Sphere};
pub use raycast::{Ray, RayHit};
pub use shape::Shape;
pub use transform::ReferenceFrame;
pub use world::{SimulationConfig, World};

/// Floating point type used for physics simulation.
#[allow(non_camel_case_types)]
pub type fph = f64;
