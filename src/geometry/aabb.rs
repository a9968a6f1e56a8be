//! Representation of axis-aligned boxes.

use crate::{fph, math::Position};
use nalgebra::{Point3, Vector3};

/// A box with orientation aligned with the coordinate system axes.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisAlignedBox {
    lower_corner: Position,
    upper_corner: Position,
}

impl AxisAlignedBox {
    /// Creates a new box with the given lower and upper corner points.
    pub fn new(lower_corner: Position, upper_corner: Position) -> Self {
        Self {
            lower_corner,
            upper_corner,
        }
    }

    /// Creates the axis-aligned bounding box for the set of points in the
    /// given slice.
    ///
    /// # Panics
    /// If the point slice is empty.
    pub fn aabb_for_points(points: &[Position]) -> Self {
        assert!(
            !points.is_empty(),
            "Tried to create AABB for empty point slice"
        );

        let mut lower_corner = points[0].coords;
        let mut upper_corner = points[0].coords;

        for point in &points[1..] {
            lower_corner = lower_corner.inf(&point.coords);
            upper_corner = upper_corner.sup(&point.coords);
        }

        Self::new(Point3::from(lower_corner), Point3::from(upper_corner))
    }

    /// Creates the axis-aligned box bounding both the given axis-aligned
    /// boxes.
    pub fn aabb_from_pair(aabb_1: &Self, aabb_2: &Self) -> Self {
        Self::new(
            Point3::from(aabb_1.lower_corner.coords.inf(&aabb_2.lower_corner.coords)),
            Point3::from(aabb_1.upper_corner.coords.sup(&aabb_2.upper_corner.coords)),
        )
    }

    /// Returns a reference to the lower corner of the box.
    pub fn lower_corner(&self) -> &Position {
        &self.lower_corner
    }

    /// Returns a reference to the upper corner of the box.
    pub fn upper_corner(&self) -> &Position {
        &self.upper_corner
    }

    /// Calculates and returns the center point of the box.
    pub fn center(&self) -> Position {
        nalgebra::center(&self.lower_corner, &self.upper_corner)
    }

    /// Returns the extents of the box along the three axes.
    pub fn extents(&self) -> Vector3<fph> {
        self.upper_corner - self.lower_corner
    }

    /// Whether this box and the given box overlap (shared boundary counts as
    /// overlap).
    pub fn overlaps_with(&self, other: &Self) -> bool {
        self.lower_corner.x <= other.upper_corner.x
            && self.upper_corner.x >= other.lower_corner.x
            && self.lower_corner.y <= other.upper_corner.y
            && self.upper_corner.y >= other.lower_corner.y
            && self.lower_corner.z <= other.upper_corner.z
            && self.upper_corner.z >= other.lower_corner.z
    }
}
