//! LBVH construction: Karras (2012) radix-tree topology over
//! Morton-sorted triangle centroids, followed by a bottom-up bbox fill
//! using one atomic counter per internal node, coordinated lock-free with
//! `rayon` and `std::sync::atomic` the way GPU-oriented BVH builders
//! typically are.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use rdst::{RadixKey, RadixSort};

use crate::error::CoreError;
use crate::geometry::{Aabb, Triangle};
use crate::morton;

use super::node::{Bvh, BvhInternal, BvhLeaf, NodeRef};

/// One triangle's centroid Morton code, extended with its original
/// triangle id in the low 32 bits so that the combined 64-bit key is
/// unique even when two centroids share a Morton code: duplicate keys are
/// disambiguated by appending the bits of the two triangle ids to the LCP
/// comparison.
#[derive(Debug, Clone, Copy)]
struct MortonKey {
    key: u64,
    triangle_id: u32,
}

impl RadixKey for MortonKey {
    const LEVELS: usize = 8;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.key >> (level * 8)) as u8
    }
}

/// Build the LBVH over one batch element's triangles:
/// 1. per-triangle AABB, 2. scene AABB reduction, 3. Morton codes of
/// normalized centroids, 4-5. stable sort by (morton code, triangle id),
/// 6. Karras radix-tree construction, 7. leaf population, 8. atomic
/// bottom-up bbox fill.
pub fn build(triangles: &[Triangle]) -> Result<Bvh, CoreError> {
    let n = triangles.len();
    if n == 0 {
        return Ok(Bvh { leaves: vec![], internals: vec![] });
    }

    // Steps 1-2: per-triangle AABB and scene AABB (commutative union).
    let aabbs: Vec<Aabb> = triangles.iter().map(Triangle::aabb).collect();
    let scene_bbox = aabbs
        .par_iter()
        .cloned()
        .reduce(Aabb::empty, |a, b| a.union(&b));

    // Step 3: Morton code of each centroid, normalized into the scene bbox.
    let mut keys: Vec<MortonKey> = (0..n)
        .into_par_iter()
        .map(|i| {
            let centroid = triangles[i].centroid();
            let normalized = scene_bbox.offset(centroid);
            let code = morton::encode_normalized(normalized);
            MortonKey { key: ((code as u64) << 32) | i as u64, triangle_id: i as u32 }
        })
        .collect();

    // Steps 4-5: identity permutation is implicit; stable sort by the
    // combined (morton code, id) key. `radix_sort_unstable` relies on
    // release-mode well-defined-underflow behavior and panics under debug
    // assertions, so debug builds fall back to the stable `sort_by_key`
    // n*log(n) path.
    if cfg!(debug_assertions) {
        keys.sort_by_key(|k| k.key);
    } else {
        keys.radix_sort_unstable();
    }

    log::debug!("lbvh build: {n} triangles sorted by morton code");

    if n == 1 {
        let leaf = BvhLeaf { bbox: aabbs[keys[0].triangle_id as usize], triangle_id: keys[0].triangle_id, parent: None };
        return Ok(Bvh { leaves: vec![leaf], internals: vec![] });
    }

    // Step 6: Karras radix tree. `internals[0]` is the root by construction:
    // `determine_range` always gives internal node 0 the full [0, n-1]
    // range because it's reached by every top-down split eventually, and
    // nothing ever assigns node 0 as anyone else's child (index 0 is only
    // ever a `split` boundary for the full-range node itself).
    let mut internals: Vec<BvhInternal> = (0..n - 1)
        .into_par_iter()
        .map(|i| process_internal_node(&keys, i))
        .collect();

    // Step 7: leaves, in sorted order, carrying the original triangle id.
    let leaves: Vec<BvhLeaf> = keys
        .par_iter()
        .map(|k| BvhLeaf { bbox: aabbs[k.triangle_id as usize], triangle_id: k.triangle_id, parent: None })
        .collect();

    // Wire up parent pointers: each internal node writes directly into its
    // two children's parent slot. Every node in the tree is the child of
    // exactly one internal node, so these writes never race; the pass
    // itself runs sequentially since each write touches a different index
    // than the one currently being read.
    let mut leaves = leaves;
    for i in 0..internals.len() {
        let (left, right) = (internals[i].left, internals[i].right);
        for child in [left, right] {
            match child {
                NodeRef::Leaf(idx) => leaves[idx as usize].parent = Some(i as u32),
                NodeRef::Internal(idx) => internals[idx as usize].parent = Some(i as u32),
            }
        }
    }

    // Step 8: bottom-up bbox fill via one atomic counter per internal node.
    let counters: Vec<AtomicU32> = (0..internals.len()).map(|_| AtomicU32::new(0)).collect();
    let internals_ptr = internals.as_mut_ptr() as usize;
    leaves.par_iter().for_each(|leaf| {
        let Some(mut parent) = leaf.parent else { return };
        let mut bbox = leaf.bbox;
        loop {
            // SAFETY: only the thread whose fetch_add observes 1 (the
            // second arrival) writes `internals[parent]`, and it does so
            // before reading it again on the next loop iteration, so there
            // is a single writer per node and no concurrent readers of a
            // half-written bbox.
            let internals_arr = internals_ptr as *mut BvhInternal;
            if counters[parent as usize].fetch_add(1, Ordering::AcqRel) == 0 {
                // first arrival: sibling subtree not finished yet, stop.
                return;
            }
            let node = unsafe { &mut *internals_arr.add(parent as usize) };
            node.bbox = bbox;
            match node.parent {
                Some(next) => parent = next,
                None => return,
            }
        }
    });

    log::debug!("lbvh build: bottom-up fill completed over {} internal nodes", internals.len());

    Ok(Bvh { leaves, internals })
}

/// `delta(i, j)`: length of the common binary prefix shared by keys `i`
/// and `j`, or `-1` if `j` is out of `[0, n-1]` (Karras 2012).
#[inline]
fn delta(keys: &[MortonKey], i: i64, j: i64) -> i64 {
    if j < 0 || j as usize >= keys.len() {
        return -1;
    }
    (keys[i as usize].key ^ keys[j as usize].key).leading_zeros() as i64
}

fn determine_range(keys: &[MortonKey], idx: usize) -> (usize, usize) {
    let i = idx as i64;
    let n = keys.len() as i64;

    let d = (delta(keys, i, i + 1) - delta(keys, i, i - 1)).signum();
    let delta_min = delta(keys, i, i - d);

    let mut lmax = 2i64;
    while delta(keys, i, i + lmax * d) > delta_min {
        lmax *= 2;
    }

    let mut l = 0i64;
    let mut t = lmax / 2;
    while t >= 1 {
        if delta(keys, i, i + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }

    let j = i + l * d;
    let (first, last) = if j < i { (j, i) } else { (i, j) };
    debug_assert!(first >= 0 && last < n);
    (first as usize, last as usize)
}

fn find_split(keys: &[MortonKey], first: usize, last: usize) -> usize {
    let first_code = keys[first].key;
    let last_code = keys[last].key;
    if first_code == last_code {
        return (first + last) >> 1;
    }
    let common_prefix = (first_code ^ last_code).leading_zeros() as i64;

    let mut split = first as i64;
    let mut step = (last - first) as i64;
    loop {
        step = (step + 1) >> 1;
        let new_split = split + step;
        if new_split < last as i64 {
            let split_prefix = (first_code ^ keys[new_split as usize].key).leading_zeros() as i64;
            if split_prefix > common_prefix {
                split = new_split;
            }
        }
        if step <= 1 {
            break;
        }
    }
    split as usize
}

fn process_internal_node(keys: &[MortonKey], idx: usize) -> BvhInternal {
    let (first, last) = determine_range(keys, idx);
    let split = find_split(keys, first, last);

    let left = if split == first {
        NodeRef::Leaf(split as u32)
    } else {
        NodeRef::Internal(split as u32)
    };
    let right = if split + 1 == last {
        NodeRef::Leaf((split + 1) as u32)
    } else {
        NodeRef::Internal((split + 1) as u32)
    };

    BvhInternal { bbox: Aabb::empty(), left, right, parent: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vec3;

    fn triangle_at(x: f32) -> Triangle {
        Triangle::new(vec3(x, 0.0, 0.0), vec3(x + 0.1, 0.0, 0.0), vec3(x, 0.1, 0.0))
    }

    #[test]
    fn single_triangle_mesh_has_no_internals() {
        let tris = vec![triangle_at(0.0)];
        let bvh = build(&tris).unwrap();
        assert_eq!(bvh.leaves.len(), 1);
        assert_eq!(bvh.internals.len(), 0);
        assert_eq!(bvh.leaves[0].triangle_id, 0);
    }

    #[test]
    fn leaf_count_is_n_and_internal_count_is_n_minus_one() {
        let tris: Vec<Triangle> = (0..37).map(|i| triangle_at(i as f32)).collect();
        let bvh = build(&tris).unwrap();
        assert_eq!(bvh.leaves.len(), 37);
        assert_eq!(bvh.internals.len(), 36);
    }

    #[test]
    fn every_triangle_id_appears_exactly_once_in_leaves() {
        let tris: Vec<Triangle> = (0..50).map(|i| triangle_at(i as f32)).collect();
        let bvh = build(&tris).unwrap();
        let mut seen = vec![false; 50];
        for leaf in &bvh.leaves {
            assert!(!seen[leaf.triangle_id as usize], "triangle id seen twice");
            seen[leaf.triangle_id as usize] = true;
        }
        assert!(seen.iter().all(|&b| b));
    }

    #[test]
    fn internal_bbox_equals_union_of_subtree_leaves() {
        let tris: Vec<Triangle> = (0..64).map(|i| triangle_at(i as f32 * 0.37)).collect();
        let bvh = build(&tris).unwrap();

        fn subtree_bbox(bvh: &Bvh, node: NodeRef) -> Aabb {
            match node {
                NodeRef::Leaf(i) => bvh.leaves[i as usize].bbox,
                NodeRef::Internal(i) => {
                    let node = &bvh.internals[i as usize];
                    subtree_bbox(bvh, node.left).union(&subtree_bbox(bvh, node.right))
                }
            }
        }

        for (i, internal) in bvh.internals.iter().enumerate() {
            let expected = subtree_bbox(&bvh, NodeRef::Internal(i as u32));
            assert_eq!(internal.bbox.min, expected.min);
            assert_eq!(internal.bbox.max, expected.max);
        }
    }

    #[test]
    fn root_is_internals_zero_when_any_internals_exist() {
        let tris: Vec<Triangle> = (0..8).map(|i| triangle_at(i as f32)).collect();
        let bvh = build(&tris).unwrap();
        assert!(bvh.internals[0].parent.is_none());
        for (i, node) in bvh.internals.iter().enumerate().skip(1) {
            assert!(node.parent.is_some(), "internal node {i} missing a parent");
        }
    }

    #[test]
    fn build_is_deterministic() {
        let tris: Vec<Triangle> = (0..41).map(|i| triangle_at((i as f32 * 1.7) % 11.0)).collect();
        let a = build(&tris).unwrap();
        let b = build(&tris).unwrap();
        let ids_a: Vec<u32> = a.leaves.iter().map(|l| l.triangle_id).collect();
        let ids_b: Vec<u32> = b.leaves.iter().map(|l| l.triangle_id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
