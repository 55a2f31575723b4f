//! Explicit-stack BVH traversal, templated on capacity via a const
//! generic over the closed set of allowed capacities {32, 64, 128, 256,
//! 512, 1024} (enforced by `TraversalCapacity` at the orchestrator
//! boundary, not here — this function trusts its caller).

use crate::geometry::{Aabb, Triangle, Vec3};
use crate::lbvh::{Bvh, NodeRef};
use crate::query_result::QueryResult;

/// Fixed-capacity LIFO stack of pending internal nodes, living in a
/// `[u32; CAP]` array to mirror fast per-worker memory on the traversal's
/// intended dispatch target. Overflow drops the branch and logs a
/// `log::warn!` once per traversal instead of the undefined behavior a
/// true fixed-capacity GPU stack would have (see DESIGN.md).
struct FixedStack<const CAP: usize> {
    items: [u32; CAP],
    len: usize,
    overflowed: bool,
}

impl<const CAP: usize> FixedStack<CAP> {
    fn new() -> Self {
        Self { items: [0; CAP], len: 0, overflowed: false }
    }

    fn push(&mut self, internal_index: u32) {
        if self.len == CAP {
            if !self.overflowed {
                log::warn!("traversal stack overflowed capacity {CAP}, dropping a branch");
                self.overflowed = true;
            }
            return;
        }
        self.items[self.len] = internal_index;
        self.len += 1;
    }

    fn pop(&mut self) -> Option<u32> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.items[self.len])
    }
}

/// Nearest point on `triangles` (addressed through `bvh`'s leaves) to
/// `point`. "Promising" for a point query is `dist_sq <= best.dist_sq` —
/// non-strict, so ties are resolved by which leaf is visited first, and
/// then by the lower triangle index.
pub fn nearest_point<const CAP: usize>(bvh: &Bvh, triangles: &[Triangle], point: Vec3) -> QueryResult {
    let mut best = QueryResult::miss();
    best.distance = f32::INFINITY;

    if bvh.leaves.is_empty() {
        return best;
    }
    if bvh.internals.is_empty() {
        return visit_leaf_point(bvh, triangles, 0, point, best);
    }

    let mut stack = FixedStack::<CAP>::new();
    let mut current = 0u32; // internals[0] is the root by construction
    loop {
        let node = &bvh.internals[current as usize];
        for child in [node.left, node.right] {
            match child {
                NodeRef::Leaf(idx) => {
                    if bvh.leaves[idx as usize].bbox.point_dist_sq(point) <= best.distance {
                        best = visit_leaf_point(bvh, triangles, idx, point, best);
                    }
                }
                NodeRef::Internal(idx) => {
                    if bvh.internals[idx as usize].bbox.point_dist_sq(point) <= best.distance {
                        stack.push(idx);
                    }
                }
            }
        }
        match stack.pop() {
            Some(next) => current = next,
            None => break,
        }
    }
    best
}

/// True if a hit on `triangle_id` at `distance` should replace `best`:
/// strictly closer, or tied and lower-indexed.
fn improves(triangle_id: u32, distance: f32, best: &QueryResult) -> bool {
    distance < best.distance || (distance == best.distance && Some(triangle_id) < best.closest_face)
}

pub(crate) fn visit_leaf_point(bvh: &Bvh, triangles: &[Triangle], leaf_idx: u32, point: Vec3, mut best: QueryResult) -> QueryResult {
    let leaf = &bvh.leaves[leaf_idx as usize];
    let tri = &triangles[leaf.triangle_id as usize];
    let cp = crate::geometry::triangle::closest_point(tri, point);
    if improves(leaf.triangle_id, cp.dist_sq, &best) {
        best = QueryResult {
            closest_point: cp.point,
            closest_face: Some(leaf.triangle_id),
            barycentric: cp.barycentric,
            distance: cp.dist_sq,
        };
    }
    best
}

/// Nearest ray hit. "Promising" for a ray query is `t_enter < best.t` —
/// strict, avoiding re-descent into AABBs exactly touching the current
/// best hit.
pub fn nearest_ray_hit<const CAP: usize>(bvh: &Bvh, triangles: &[Triangle], origin: Vec3, direction: Vec3) -> QueryResult {
    let mut best = QueryResult::miss();

    if bvh.leaves.is_empty() {
        return best;
    }

    let inv_dir = Vec3(1.0 / direction.0, 1.0 / direction.1, 1.0 / direction.2);

    if bvh.internals.is_empty() {
        return visit_leaf_ray(bvh, triangles, 0, origin, direction, best);
    }

    let mut stack = FixedStack::<CAP>::new();
    let mut current = 0u32;
    loop {
        let node = &bvh.internals[current as usize];
        for child in [node.left, node.right] {
            match child {
                NodeRef::Leaf(idx) => {
                    if enters_before_best(&bvh.leaves[idx as usize].bbox, origin, inv_dir, best.distance) {
                        best = visit_leaf_ray(bvh, triangles, idx, origin, direction, best);
                    }
                }
                NodeRef::Internal(idx) => {
                    if enters_before_best(&bvh.internals[idx as usize].bbox, origin, inv_dir, best.distance) {
                        stack.push(idx);
                    }
                }
            }
        }
        match stack.pop() {
            Some(next) => current = next,
            None => break,
        }
    }
    best
}

fn enters_before_best(bbox: &Aabb, origin: Vec3, inv_dir: Vec3, best_t: f32) -> bool {
    match bbox.ray_slab(origin, inv_dir) {
        Some((t_enter, _)) => t_enter < best_t,
        None => false,
    }
}

pub(crate) fn visit_leaf_ray(bvh: &Bvh, triangles: &[Triangle], leaf_idx: u32, origin: Vec3, direction: Vec3, mut best: QueryResult) -> QueryResult {
    let leaf = &bvh.leaves[leaf_idx as usize];
    let tri = &triangles[leaf.triangle_id as usize];
    if let Some(hit) = crate::geometry::triangle::intersect_ray(tri, origin, direction) {
        if improves(leaf.triangle_id, hit.t, &best) {
            best = QueryResult {
                closest_point: hit.point,
                closest_face: Some(leaf.triangle_id),
                barycentric: hit.barycentric,
                distance: hit.t,
            };
        }
    }
    best
}
