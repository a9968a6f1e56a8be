//! Collision shapes.

use crate::{
    fph,
    geometry::{AxisAlignedBox, ConvexHull},
    math::{MAX_NUMBER, Position},
    transform::ReferenceFrame,
};
use nalgebra::{point, vector};

/// A collision shape, expressed in its own local frame.
///
/// The variant set is closed; pair-wise collision handling dispatches over
/// the full cross product of variants.
#[derive(Clone, Debug)]
pub enum Shape {
    /// The unbounded plane through the local origin with local +z normal.
    Plane,
    /// A sphere centered on the local origin.
    Sphere { radius: fph },
    /// A convex polyhedron.
    Convex(ConvexHull),
}

impl Shape {
    /// Computes the world-space axis-aligned bounding box of the shape under
    /// the given frame. The box of a plane is the sentinel box extending
    /// [`MAX_NUMBER`] in every direction.
    pub fn compute_aabb(&self, frame: &ReferenceFrame) -> AxisAlignedBox {
        match self {
            Self::Plane => AxisAlignedBox::new(
                point![-MAX_NUMBER, -MAX_NUMBER, -MAX_NUMBER],
                point![MAX_NUMBER, MAX_NUMBER, MAX_NUMBER],
            ),
            Self::Sphere { radius } => {
                let center = frame.position;
                let half_extents = vector![*radius, *radius, *radius];
                AxisAlignedBox::new(center - half_extents, center + half_extents)
            }
            Self::Convex(hull) => {
                let transformed = hull.transformed(frame);
                AxisAlignedBox::aabb_for_points(transformed.vertices())
            }
        }
    }

    /// Returns the smallest radius of a sphere centered on the local origin
    /// of the parent frame that encloses both the shape under the given
    /// frame and the given current radius. A plane is unbounded and expands
    /// the radius to [`MAX_NUMBER`].
    pub fn expand_bounding_sphere_radius(&self, frame: &ReferenceFrame, current: fph) -> fph {
        match self {
            Self::Plane => MAX_NUMBER,
            Self::Sphere { radius } => fph::max(current, frame.position.coords.norm() + radius),
            Self::Convex(hull) => hull.vertices().iter().fold(current, |radius, vertex| {
                fph::max(radius, frame.transform_point(vertex).coords.norm())
            }),
        }
    }
}

/// A shape together with its offset within the body that carries it.
#[derive(Clone, Debug)]
pub struct BodyShape {
    /// The offset of the shape's local frame within the body frame.
    pub frame: ReferenceFrame,
    /// The shape itself.
    pub shape: Shape,
}

impl BodyShape {
    /// Creates a new body shape with the given offset frame.
    pub fn new(frame: ReferenceFrame, shape: Shape) -> Self {
        Self { frame, shape }
    }

    /// Computes the world frame of the shape given the world frame of the
    /// carrying body.
    pub fn world_frame(&self, body_frame: &ReferenceFrame) -> ReferenceFrame {
        self.frame.transformed_by(body_frame)
    }

    /// Unit-density volume, center of mass (in the body frame) and inertia
    /// contribution used when deriving the mass properties of the carrying
    /// body. Planes are unbounded and contribute nothing.
    pub(crate) fn mass_contribution(&self) -> Option<ShapeMassContribution> {
        match &self.shape {
            Shape::Plane => None,
            Shape::Sphere { radius } => {
                let volume = (4.0 / 3.0) * std::f64::consts::PI * radius.powi(3);
                let moment = (2.0 / 5.0) * volume * radius.powi(2);
                Some(ShapeMassContribution {
                    volume,
                    center_of_mass: self.frame.position,
                    inertia: nalgebra::Matrix3::from_diagonal(&vector![moment, moment, moment]),
                })
            }
            Shape::Convex(hull) => {
                let placed = hull.transformed(&self.frame);
                Some(ShapeMassContribution {
                    volume: placed.volume(),
                    center_of_mass: *placed.center_of_mass(),
                    inertia: *placed.inertia_matrix(),
                })
            }
        }
    }
}

pub(crate) struct ShapeMassContribution {
    pub volume: fph,
    pub center_of_mass: Position,
    pub inertia: nalgebra::Matrix3<fph>,
}
