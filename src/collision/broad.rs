//! Broad-phase candidate pair production.

use crate::{
    body::{Body, BodyId},
    geometry::Sphere,
};

/// Produces the set of body pairs whose bounding volumes overlap and that
/// should therefore be handed to the narrow phase. Pairs of two static
/// bodies are excluded. The returned pairs are ordered by ascending id pair
/// so that downstream contact generation is deterministic regardless of the
/// order bodies are stored in.
pub(crate) fn collect_candidate_pairs(entries: &[(BodyId, &Body)]) -> Vec<(BodyId, BodyId)> {
    let aabbs: Vec<_> = entries
        .iter()
        .map(|(_, body)| {
            Sphere::new(*body.position(), body.bounding_sphere_radius()).compute_aabb()
        })
        .collect();

    let mut pairs = Vec::new();

    for (idx_a, (id_a, body_a)) in entries.iter().enumerate() {
        for (offset, (id_b, body_b)) in entries[idx_a + 1..].iter().enumerate() {
            if body_a.is_static() && body_b.is_static() {
                continue;
            }
            if aabbs[idx_a].overlaps_with(&aabbs[idx_a + 1 + offset]) {
                pairs.push(if id_a < id_b {
                    (*id_a, *id_b)
                } else {
                    (*id_b, *id_a)
                });
            }
        }
    }

    pairs.sort_unstable();
    pairs
}
