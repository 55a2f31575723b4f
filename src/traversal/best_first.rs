//! Best-first BVH traversal: a fixed-capacity priority queue keyed by
//! AABB distance, extracting the minimum each step. Visits fewer leaves
//! on average than the stack variant at higher per-operation cost, and
//! must agree with it up to tie-breaking by triangle index.

use crate::geometry::{Aabb, Triangle, Vec3};
use crate::lbvh::{Bvh, NodeRef};
use crate::query_result::QueryResult;

/// A bounded ascending-sorted list standing in for a fixed-capacity
/// max-of-min priority queue: `pop_min` is O(1), `insert` is O(CAP)
/// (binary search + shift), which is negligible at the capacities this
/// traversal allows (<= 1024). When full, a worse entry than the current
/// maximum is simply dropped — the queue's "max" eviction policy.
struct BoundedQueue<const CAP: usize> {
    entries: Vec<(f32, NodeRef)>,
}

impl<const CAP: usize> BoundedQueue<CAP> {
    fn new() -> Self {
        Self { entries: Vec::with_capacity(CAP.min(64)) }
    }

    fn insert(&mut self, key: f32, node: NodeRef) {
        if self.entries.len() >= CAP {
            if let Some(&(worst_key, _)) = self.entries.last() {
                if key >= worst_key {
                    return;
                }
                self.entries.pop();
            }
        }
        let pos = self.entries.partition_point(|&(k, _)| k <= key);
        self.entries.insert(pos, (key, node));
    }

    fn pop_min(&mut self) -> Option<(f32, NodeRef)> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }
}

pub fn nearest_point<const CAP: usize>(bvh: &Bvh, triangles: &[Triangle], point: Vec3) -> QueryResult {
    let mut best = QueryResult::miss();

    if bvh.leaves.is_empty() {
        return best;
    }
    if bvh.internals.is_empty() {
        return super::stack::visit_leaf_point(bvh, triangles, 0, point, best);
    }

    let mut queue = BoundedQueue::<CAP>::new();
    queue.insert(bvh.internals[0].bbox.point_dist_sq(point), NodeRef::Internal(0));

    while let Some((key, node)) = queue.pop_min() {
        if key > best.distance {
            break;
        }
        let NodeRef::Internal(idx) = node else { unreachable!("only internal nodes are queued") };
        let internal = &bvh.internals[idx as usize];
        for child in [internal.left, internal.right] {
            match child {
                NodeRef::Leaf(leaf_idx) => {
                    let dist = bvh.leaves[leaf_idx as usize].bbox.point_dist_sq(point);
                    if dist <= best.distance {
                        best = super::stack::visit_leaf_point(bvh, triangles, leaf_idx, point, best);
                    }
                }
                NodeRef::Internal(child_idx) => {
                    let dist = bvh.internals[child_idx as usize].bbox.point_dist_sq(point);
                    if dist <= best.distance {
                        queue.insert(dist, NodeRef::Internal(child_idx));
                    }
                }
            }
        }
    }
    best
}

pub fn nearest_ray_hit<const CAP: usize>(bvh: &Bvh, triangles: &[Triangle], origin: Vec3, direction: Vec3) -> QueryResult {
    let mut best = QueryResult::miss();

    if bvh.leaves.is_empty() {
        return best;
    }

    let inv_dir = Vec3(1.0 / direction.0, 1.0 / direction.1, 1.0 / direction.2);

    if bvh.internals.is_empty() {
        return super::stack::visit_leaf_ray(bvh, triangles, 0, origin, direction, best);
    }

    let Some((root_enter, _)) = bvh.internals[0].bbox.ray_slab(origin, inv_dir) else {
        return best;
    };

    let mut queue = BoundedQueue::<CAP>::new();
    queue.insert(root_enter, NodeRef::Internal(0));

    while let Some((key, node)) = queue.pop_min() {
        if key >= best.distance {
            break;
        }
        let NodeRef::Internal(idx) = node else { unreachable!("only internal nodes are queued") };
        let internal = &bvh.internals[idx as usize];
        for child in [internal.left, internal.right] {
            let bbox = child_bbox(bvh, child);
            if let Some((t_enter, _)) = ray_slab_entry(&bbox, origin, inv_dir, best.distance) {
                match child {
                    NodeRef::Leaf(leaf_idx) => {
                        best = super::stack::visit_leaf_ray(bvh, triangles, leaf_idx, origin, direction, best);
                    }
                    NodeRef::Internal(child_idx) => queue.insert(t_enter, NodeRef::Internal(child_idx)),
                }
            }
        }
    }
    best
}

fn child_bbox(bvh: &Bvh, node: NodeRef) -> Aabb {
    match node {
        NodeRef::Leaf(idx) => bvh.leaves[idx as usize].bbox,
        NodeRef::Internal(idx) => bvh.internals[idx as usize].bbox,
    }
}

fn ray_slab_entry(bbox: &Aabb, origin: Vec3, inv_dir: Vec3, best_t: f32) -> Option<(f32, f32)> {
    match bbox.ray_slab(origin, inv_dir) {
        Some((t_enter, t_exit)) if t_enter < best_t => Some((t_enter, t_exit)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vec3;
    use crate::lbvh::build;
    use crate::traversal::stack;

    fn scattered_mesh(n: usize) -> Vec<Triangle> {
        (0..n)
            .map(|i| {
                let x = (i as f32) * 1.3;
                Triangle::new(vec3(x, 0.0, 0.0), vec3(x + 0.4, 0.0, 0.0), vec3(x, 0.4, 0.3))
            })
            .collect()
    }

    #[test]
    fn agrees_with_stack_traversal_for_points() {
        let tris = scattered_mesh(30);
        let bvh = build(&tris).unwrap();
        for i in 0..30 {
            let q = vec3(i as f32 * 1.1 - 2.0, 0.2, 0.1);
            let a = nearest_point::<64>(&bvh, &tris, q);
            let b = stack::nearest_point::<64>(&bvh, &tris, q);
            assert_eq!(a.closest_face, b.closest_face);
            assert!((a.distance - b.distance).abs() < 1e-4);
        }
    }

    #[test]
    fn agrees_with_stack_traversal_for_rays() {
        let tris = scattered_mesh(30);
        let bvh = build(&tris).unwrap();
        for i in 0..30 {
            let x = i as f32 * 1.3 + 0.1;
            let origin = vec3(x, 0.1, 5.0);
            let direction = vec3(0.0, 0.0, -1.0);
            let a = nearest_ray_hit::<64>(&bvh, &tris, origin, direction);
            let b = stack::nearest_ray_hit::<64>(&bvh, &tris, origin, direction);
            assert_eq!(a.closest_face, b.closest_face);
            if a.closest_face.is_some() {
                assert!((a.distance - b.distance).abs() < 1e-4);
            }
        }
    }
}
