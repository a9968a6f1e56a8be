//! Collision detection.

pub mod broad;
mod convex;
pub mod narrow;
