//! Narrow-phase contact generation.

use crate::{
    body::{BodyId, Material},
    collision::convex,
    constraint::contact::{Contact, ContactGeometry, ContactId, ContactManifold, ContactWithId},
    fph,
    geometry::{ConvexHull, Plane},
    math::{Direction, PRECISION, Position},
    shape::Shape,
    transform::ReferenceFrame,
};
use nalgebra::Vector3;

/// A shape of a body placed in world space, ready for pair-wise contact
/// generation.
pub(crate) struct Collidable<'a> {
    pub body_id: BodyId,
    pub shape_index: usize,
    pub frame: ReferenceFrame,
    pub shape: &'a Shape,
    pub material: &'a Material,
}

/// Generates the contacts between the two given collidables and appends them
/// to the manifold. Contact normals point from the body of `collidable_a`
/// toward the body of `collidable_b`.
pub(crate) fn generate_shape_contacts(
    collidable_a: &Collidable<'_>,
    collidable_b: &Collidable<'_>,
    manifold: &mut ContactManifold,
) {
    let base_id = ContactId::from_bodies(collidable_a.body_id, collidable_b.body_id)
        .mixed_with_index(collidable_a.shape_index)
        .mixed_with_index(collidable_b.shape_index);

    let material = collidable_a.material.combined(collidable_b.material);

    let mut emit = |id: ContactId, geometry: ContactGeometry| {
        manifold.add_contact(ContactWithId {
            id,
            contact: Contact { geometry, material },
        });
    };

    match (collidable_a.shape, collidable_b.shape) {
        (Shape::Plane, Shape::Plane) => {
            // Not useful
        }
        (Shape::Sphere { radius: radius_a }, Shape::Sphere { radius: radius_b }) => {
            if let Some(geometry) = determine_sphere_sphere_contact_geometry(
                &collidable_a.frame.position,
                *radius_a,
                &collidable_b.frame.position,
                *radius_b,
            ) {
                emit(base_id, geometry);
            }
        }
        (Shape::Plane, Shape::Sphere { radius }) => {
            if let Some(geometry) = determine_plane_sphere_contact_geometry(
                &world_plane(&collidable_a.frame),
                &collidable_b.frame.position,
                *radius,
            ) {
                emit(base_id, geometry);
            }
        }
        (Shape::Sphere { radius }, Shape::Plane) => {
            if let Some(geometry) = determine_plane_sphere_contact_geometry(
                &world_plane(&collidable_b.frame),
                &collidable_a.frame.position,
                *radius,
            ) {
                emit(base_id, geometry.flipped());
            }
        }
        (Shape::Plane, Shape::Convex(hull)) => {
            let world_hull = hull.transformed(&collidable_b.frame);
            generate_plane_convex_contacts(
                &world_plane(&collidable_a.frame),
                &world_hull,
                &mut |geometry, vertex_idx| {
                    emit(base_id.mixed_with_index(vertex_idx), geometry);
                },
            );
        }
        (Shape::Convex(hull), Shape::Plane) => {
            let world_hull = hull.transformed(&collidable_a.frame);
            generate_plane_convex_contacts(
                &world_plane(&collidable_b.frame),
                &world_hull,
                &mut |geometry, vertex_idx| {
                    emit(base_id.mixed_with_index(vertex_idx), geometry.flipped());
                },
            );
        }
        (Shape::Sphere { radius }, Shape::Convex(hull)) => {
            let world_hull = hull.transformed(&collidable_b.frame);
            if let Some(geometry) = determine_sphere_convex_contact_geometry(
                &collidable_a.frame.position,
                *radius,
                &world_hull,
            ) {
                emit(base_id, geometry);
            }
        }
        (Shape::Convex(hull), Shape::Sphere { radius }) => {
            let world_hull = hull.transformed(&collidable_a.frame);
            if let Some(geometry) = determine_sphere_convex_contact_geometry(
                &collidable_b.frame.position,
                *radius,
                &world_hull,
            ) {
                emit(base_id, geometry.flipped());
            }
        }
        (Shape::Convex(hull_a), Shape::Convex(hull_b)) => {
            let world_hull_a = hull_a.transformed(&collidable_a.frame);
            let world_hull_b = hull_b.transformed(&collidable_b.frame);
            convex::generate_convex_convex_contacts(
                &world_hull_a,
                &world_hull_b,
                &mut |geometry, feature_indices| {
                    let [idx_1, idx_2, idx_3] = feature_indices;
                    emit(
                        base_id
                            .mixed_with_index(idx_1)
                            .mixed_with_index(idx_2)
                            .mixed_with_index(idx_3),
                        geometry,
                    );
                },
            );
        }
    }
}

/// The world-space plane of a plane shape under the given frame (local +z
/// normal through the frame origin).
fn world_plane(frame: &ReferenceFrame) -> Plane {
    let normal = Direction::new_unchecked(frame.transform_vector(&Vector3::z_axis()));
    Plane::from_normal_and_point(normal, &frame.position)
}

/// Contact between two spheres. The spheres touch when the gap between
/// their surfaces along the line of centers is no longer positive; the
/// contact point is where that line exits sphere B, and the normal points
/// from sphere A toward sphere B.
pub(crate) fn determine_sphere_sphere_contact_geometry(
    center_a: &Position,
    radius_a: fph,
    center_b: &Position,
    radius_b: fph,
) -> Option<ContactGeometry> {
    let line_of_centers = center_b - center_a;
    let surface_gap = line_of_centers.norm() - (radius_a + radius_b);

    if surface_gap > 0.0 {
        return None;
    }

    // Concentric spheres have no line of centers to align with, so any
    // fixed axis serves as the contact normal
    let normal =
        Direction::try_new(line_of_centers, PRECISION).unwrap_or_else(|| Vector3::z_axis());

    Some(ContactGeometry {
        position: center_b - normal.scale(radius_b),
        normal,
        penetration_depth: -surface_gap,
    })
}

/// Contact between a plane and a sphere: the sphere touches when its
/// deepest point along the plane normal lies behind the plane. The contact
/// point is the sphere center projected onto the plane, and the normal
/// points from the plane toward the sphere.
pub(crate) fn determine_plane_sphere_contact_geometry(
    plane: &Plane,
    sphere_center: &Position,
    sphere_radius: fph,
) -> Option<ContactGeometry> {
    let normal = *plane.unit_normal();

    let deepest_point = sphere_center - normal.scale(sphere_radius);
    let penetration_depth = -plane.compute_signed_distance(&deepest_point);

    if penetration_depth < 0.0 {
        return None;
    }

    Some(ContactGeometry {
        position: plane.project_point_onto_plane(sphere_center),
        normal,
        penetration_depth,
    })
}

/// Contacts between a plane and a convex hull in world space: every hull
/// vertex behind the plane becomes a contact point, with the plane normal as
/// the contact normal.
pub(crate) fn generate_plane_convex_contacts(
    plane: &Plane,
    world_hull: &ConvexHull,
    emit: &mut impl FnMut(ContactGeometry, usize),
) {
    for (vertex_idx, vertex) in world_hull.vertices().iter().enumerate() {
        let signed_distance = plane.compute_signed_distance(vertex);
        if signed_distance <= PRECISION {
            emit(
                ContactGeometry {
                    position: *vertex,
                    normal: *plane.unit_normal(),
                    penetration_depth: fph::max(0.0, -signed_distance),
                },
                vertex_idx,
            );
        }
    }
}

/// Contact between a sphere and a convex hull in world space, with the
/// normal pointing from the sphere toward the hull and the contact point on
/// the hull surface.
pub(crate) fn determine_sphere_convex_contact_geometry(
    sphere_center: &Position,
    sphere_radius: fph,
    world_hull: &ConvexHull,
) -> Option<ContactGeometry> {
    let (closest, center_is_inside) = world_hull.closest_surface_point(sphere_center);

    let displacement = closest - sphere_center;
    let distance = displacement.norm();

    let penetration_depth = if center_is_inside {
        sphere_radius + distance
    } else {
        sphere_radius - distance
    };

    if penetration_depth < -PRECISION {
        return None;
    }

    let normal = if distance > PRECISION {
        let outward = if center_is_inside {
            displacement
        } else {
            -displacement
        };
        Direction::new_unchecked(-outward.unscale(distance))
    } else {
        // The sphere center lies on the hull surface; fall back to the
        // normal of the nearest face
        let nearest_face = world_hull
            .faces()
            .iter()
            .min_by(|face_1, face_2| {
                let distance_1 = face_1.compute_signed_distance(sphere_center).abs();
                let distance_2 = face_2.compute_signed_distance(sphere_center).abs();
                distance_1.total_cmp(&distance_2)
            })
            .expect("hull must have at least one face");
        Direction::new_unchecked(-nearest_face.normal().into_inner())
    };

    Some(ContactGeometry {
        position: closest,
        normal,
        penetration_depth: fph::max(0.0, penetration_depth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::point;

    #[test]
    fn separated_spheres_yield_no_contact() {
        assert!(
            determine_sphere_sphere_contact_geometry(
                &Position::origin(),
                1.0,
                &point![3.0, 0.0, 0.0],
                1.0,
            )
            .is_none()
        );
    }

    #[test]
    fn overlapping_spheres_yield_contact_on_line_of_centers() {
        let geometry = determine_sphere_sphere_contact_geometry(
            &Position::origin(),
            1.0,
            &point![1.5, 0.0, 0.0],
            1.0,
        )
        .unwrap();

        assert_abs_diff_eq!(
            geometry.normal.into_inner(),
            Vector3::x_axis().into_inner(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(geometry.position, point![0.5, 0.0, 0.0], epsilon = 1e-12);
        assert_abs_diff_eq!(geometry.penetration_depth, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn concentric_spheres_fall_back_to_z_normal() {
        let geometry = determine_sphere_sphere_contact_geometry(
            &Position::origin(),
            1.0,
            &Position::origin(),
            1.0,
        )
        .unwrap();
        assert_abs_diff_eq!(
            geometry.normal.into_inner(),
            Vector3::z_axis().into_inner()
        );
    }

    #[test]
    fn sphere_resting_on_plane_yields_contact_on_plane() {
        let plane = Plane::new(Vector3::z_axis(), 0.0);
        let geometry =
            determine_plane_sphere_contact_geometry(&plane, &point![2.0, 3.0, 0.9], 1.0).unwrap();

        assert_abs_diff_eq!(
            geometry.normal.into_inner(),
            Vector3::z_axis().into_inner()
        );
        assert_abs_diff_eq!(geometry.position, point![2.0, 3.0, 0.0], epsilon = 1e-12);
        assert_abs_diff_eq!(geometry.penetration_depth, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn sphere_above_plane_yields_no_contact() {
        let plane = Plane::new(Vector3::z_axis(), 0.0);
        assert!(
            determine_plane_sphere_contact_geometry(&plane, &point![0.0, 0.0, 1.5], 1.0).is_none()
        );
    }

    #[test]
    fn box_corners_below_plane_each_yield_a_contact() {
        let hull = ConvexHull::from_box(2.0, 2.0, 2.0)
            .transformed(&ReferenceFrame::unoriented(point![0.0, 0.0, 0.9]));
        let plane = Plane::new(Vector3::z_axis(), 0.0);

        let mut contacts = Vec::new();
        generate_plane_convex_contacts(&plane, &hull, &mut |geometry, vertex_idx| {
            contacts.push((geometry, vertex_idx));
        });

        // The four lower corners of the box are 0.1 below the plane
        assert_eq!(contacts.len(), 4);
        let mut vertex_indices: Vec<_> =
            contacts.iter().map(|(_, vertex_idx)| *vertex_idx).collect();
        vertex_indices.sort_unstable();
        vertex_indices.dedup();
        assert_eq!(vertex_indices.len(), 4);
        for (geometry, _) in &contacts {
            assert_abs_diff_eq!(geometry.penetration_depth, 0.1, epsilon = 1e-12);
            assert_abs_diff_eq!(
                geometry.normal.into_inner(),
                Vector3::z_axis().into_inner()
            );
        }
    }

    #[test]
    fn sphere_touching_box_face_yields_single_shallow_contact() {
        let hull = ConvexHull::from_box(2.0, 2.0, 2.0);
        let geometry =
            determine_sphere_convex_contact_geometry(&point![0.0, 0.0, 5.999], 5.0, &hull)
                .unwrap();

        // The normal points from the sphere toward the hull
        assert_abs_diff_eq!(
            geometry.normal.into_inner(),
            -Vector3::z_axis().into_inner(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(geometry.position, point![0.0, 0.0, 1.0], epsilon = 1e-9);
        assert_abs_diff_eq!(geometry.penetration_depth, 0.001, epsilon = 1e-9);
    }

    #[test]
    fn sphere_far_from_hull_yields_no_contact() {
        let hull = ConvexHull::from_box(2.0, 2.0, 2.0);
        assert!(
            determine_sphere_convex_contact_geometry(&point![0.0, 0.0, 7.0], 5.0, &hull).is_none()
        );
    }

    #[test]
    fn sphere_center_inside_hull_gets_deep_contact() {
        let hull = ConvexHull::from_box(2.0, 2.0, 2.0);
        let geometry =
            determine_sphere_convex_contact_geometry(&point![0.0, 0.0, 0.5], 1.0, &hull).unwrap();

        assert_abs_diff_eq!(
            geometry.normal.into_inner(),
            -Vector3::z_axis().into_inner(),
            epsilon = 1e-12
        );
        // Depth is the radius plus the distance from the center to the
        // nearest surface point
        assert_abs_diff_eq!(geometry.penetration_depth, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn dispatch_is_symmetric_up_to_normal_flip() {
        let sphere_shape = Shape::Sphere { radius: 1.0 };
        let box_shape = Shape::Convex(ConvexHull::from_box(2.0, 2.0, 2.0));
        let material = Material::default();

        let sphere_collidable = Collidable {
            body_id: BodyId(0),
            shape_index: 0,
            frame: ReferenceFrame::unoriented(point![0.0, 0.0, 1.8]),
            shape: &sphere_shape,
            material: &material,
        };
        let box_collidable = Collidable {
            body_id: BodyId(1),
            shape_index: 0,
            frame: ReferenceFrame::identity(),
            shape: &box_shape,
            material: &material,
        };

        let mut manifold = ContactManifold::new();
        generate_shape_contacts(&sphere_collidable, &box_collidable, &mut manifold);
        assert_eq!(manifold.contacts().len(), 1);
        let sphere_first = manifold.contacts()[0].contact.geometry.clone();

        manifold.clear();
        generate_shape_contacts(&box_collidable, &sphere_collidable, &mut manifold);
        assert_eq!(manifold.contacts().len(), 1);
        let box_first = manifold.contacts()[0].contact.geometry.clone();

        assert_abs_diff_eq!(
            sphere_first.normal.into_inner(),
            -box_first.normal.into_inner(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(sphere_first.position, box_first.position, epsilon = 1e-12);
        assert_abs_diff_eq!(
            sphere_first.penetration_depth,
            box_first.penetration_depth,
            epsilon = 1e-12
        );
    }
}
