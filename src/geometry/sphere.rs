//! Representation of spheres.

use crate::{
    fph,
    geometry::AxisAlignedBox,
    math::Position,
    transform::ReferenceFrame,
};
use nalgebra::vector;

/// A sphere represented by the center point and the radius.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    center: Position,
    radius: fph,
}

impl Sphere {
    /// Creates a new sphere with the given center and radius.
    ///
    /// # Panics
    /// If `radius` is negative.
    pub fn new(center: Position, radius: fph) -> Self {
        assert!(radius >= 0.0);
        Self { center, radius }
    }

    /// Returns the center of the sphere.
    pub fn center(&self) -> &Position {
        &self.center
    }

    /// Returns the radius of the sphere.
    pub fn radius(&self) -> fph {
        self.radius
    }

    /// Computes the sphere obtained by transforming this sphere with the
    /// given frame.
    pub fn transformed(&self, frame: &ReferenceFrame) -> Self {
        Self::new(frame.transform_point(&self.center), self.radius)
    }

    /// Computes the axis-aligned bounding box of the sphere.
    pub fn compute_aabb(&self) -> AxisAlignedBox {
        let half_extents = vector![self.radius, self.radius, self.radius];
        AxisAlignedBox::new(self.center - half_extents, self.center + half_extents)
    }
}
