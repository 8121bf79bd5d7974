// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dynamic bounding volume hierarchy itself: insertion via greedy
//! surface-area-heuristic descent, O(1) removal via the item index,
//! predicate-guided traversal, and a Morton-order bulk rebuild.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::hash::Hash;

use crate::bounds::Bounds;
use crate::item_index::ItemIndex;
use crate::morton::{map_vector3, morton3};
use crate::node::{Node, NodeIdx, NodeKind};
use crate::pool::Pool;

/// A dynamic bounding volume hierarchy over items of type `Item`.
///
/// `Item` is an opaque, application-supplied identifier: `Copy + Eq + Hash`.
/// Duplicate inserts of the same item are rejected; removing an untracked
/// item is a no-op. See the crate documentation for the full contract.
pub struct Bvh<Item: Copy + Eq + Hash> {
    pool: Pool<Item>,
    root: Option<NodeIdx>,
    items: ItemIndex<Item>,
    inflation: f32,
    // `bottom_up`'s scratch sort buffer and merge FIFO: cleared, not
    // reallocated, between calls.
    sort_scratch: Vec<(u32, NodeIdx)>,
    merge_queue: VecDeque<NodeIdx>,
}

impl<Item: Copy + Eq + Hash> Bvh<Item> {
    /// Create an empty BVH with the given initial node-pool capacity.
    ///
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: Pool::new(capacity),
            root: None,
            items: ItemIndex::new(),
            inflation: 1.0,
            sort_scratch: Vec::new(),
            merge_queue: VecDeque::new(),
        }
    }

    /// Set the loose-fit inflation factor applied to refit bounds on
    /// `insert` (1.0, the default, disables inflation). Never affects
    /// `bottom_up`, whose unions are always exact.
    pub fn with_inflation(mut self, factor: f32) -> Self {
        self.inflation = factor;
        self
    }

    /// Current node-pool capacity.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Number of tracked items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if no items are tracked.
    pub fn is_empty(&self) -> bool {
        self.items.len() == 0
    }

    /// Insert `item` with the given bounds. Returns `false` without
    /// changing the tree if `item` is already tracked.
    pub fn insert(&mut self, item: Item, bounds: Bounds) -> bool {
        if self.items.contains(&item) {
            return false;
        }

        let leaf = self.pool.allocate(Node {
            bounds,
            parent: None,
            kind: NodeKind::Leaf(item),
        });
        self.items.insert(item, leaf);

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return true;
        };

        let sibling = self.select_sibling(root, bounds);
        let sibling_parent = self.pool.get(sibling).parent;

        let interior_bounds = self.pool.get(sibling).bounds.union(bounds);
        let interior = self.pool.allocate(Node {
            bounds: interior_bounds,
            parent: sibling_parent,
            kind: NodeKind::Internal {
                left: sibling,
                right: leaf,
            },
        });
        self.pool.get_mut(sibling).parent = Some(interior);
        self.pool.get_mut(leaf).parent = Some(interior);

        match sibling_parent {
            None => self.root = Some(interior),
            Some(grandparent) => self.replace_child(grandparent, sibling, interior),
        }

        self.refit_from(sibling_parent);
        true
    }

    /// Remove `item`. Returns `false` if it was not tracked.
    pub fn remove(&mut self, item: &Item) -> bool {
        let Some(leaf) = self.items.remove(item) else {
            return false;
        };

        match self.pool.get(leaf).parent {
            None => {
                self.root = None;
                self.pool.free(leaf);
            }
            Some(parent) => {
                let grandparent = self.pool.get(parent).parent;
                let (left, right) = self
                    .pool
                    .get(parent)
                    .children()
                    .expect("a leaf's parent is always interior");
                let sibling = if left == leaf { right } else { left };

                self.pool.get_mut(sibling).parent = grandparent;
                match grandparent {
                    None => self.root = Some(sibling),
                    Some(gp) => self.replace_child(gp, parent, sibling),
                }

                self.pool.free(parent);
                self.pool.free(leaf);
            }
        }
        true
    }

    /// Move `item` to `new_bounds`, defined as `remove` followed by
    /// `insert`. Returns `false` (no change) if `item` was not tracked.
    pub fn update(&mut self, item: Item, new_bounds: Bounds) -> bool {
        if !self.remove(&item) {
            return false;
        }
        self.insert(item, new_bounds);
        true
    }

    /// Pre-order depth-first traversal from the root. At each node, `predicate`
    /// decides whether to recurse/report; leaves matching it invoke
    /// `callback`. Sibling visitation order (left before right) is
    /// deterministic but not otherwise part of the contract.
    pub fn traversal(
        &self,
        mut predicate: impl FnMut(Bounds) -> bool,
        mut callback: impl FnMut(Item),
    ) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = Vec::new();
        stack.push(root);
        while let Some(idx) = stack.pop() {
            let node = self.pool.get(idx);
            if !predicate(node.bounds) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(item) => callback(item),
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Rebuild the hierarchy bottom-up from a Morton (Z-order) sort of
    /// leaf centroids, normalized against the current root's bounds. A
    /// no-op on an empty tree.
    pub fn bottom_up(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        let normalization = self.pool.get(root).bounds;
        let (norm_min, norm_max) = (normalization.min(), normalization.max());

        self.sort_scratch.clear();
        let mut stack = Vec::new();
        stack.push(root);
        while let Some(idx) = stack.pop() {
            if self.pool.get(idx).is_leaf() {
                self.pool.get_mut(idx).parent = None;
                let centroid = self.pool.get(idx).bounds.center;
                let mapped = map_vector3(centroid, norm_min, norm_max, 0.0, 1.0);
                self.sort_scratch.push((morton3(mapped), idx));
            } else {
                let (left, right) = self
                    .pool
                    .get(idx)
                    .children()
                    .expect("non-leaf node must have children");
                stack.push(left);
                stack.push(right);
                self.pool.free(idx);
            }
        }
        self.sort_scratch.sort_by_key(|&(key, _)| key);

        self.merge_queue.clear();
        self.merge_queue
            .extend(self.sort_scratch.iter().map(|&(_, idx)| idx));

        while self.merge_queue.len() > 1 {
            let a = self.merge_queue.pop_front().expect("len > 1");
            let b = self.merge_queue.pop_front().expect("len > 1");
            let bounds = self.pool.get(a).bounds.union(self.pool.get(b).bounds);
            let interior = self.pool.allocate(Node {
                bounds,
                parent: None,
                kind: NodeKind::Internal { left: a, right: b },
            });
            self.pool.get_mut(a).parent = Some(interior);
            self.pool.get_mut(b).parent = Some(interior);
            self.merge_queue.push_back(interior);
        }
        self.root = self.merge_queue.pop_front();
    }

    /// Greedy SAH descent: at each interior node, recurse into whichever
    /// child's enlarged union has the smaller surface area. Ties descend
    /// left.
    fn select_sibling(&self, mut cur: NodeIdx, bounds: Bounds) -> NodeIdx {
        while let Some((left, right)) = self.pool.get(cur).children() {
            let area_left = self.pool.get(left).bounds.union(bounds).surface_area();
            let area_right = self.pool.get(right).bounds.union(bounds).surface_area();
            cur = if area_left <= area_right { left } else { right };
        }
        cur
    }

    /// Walk upward from `start`, recomputing each ancestor's bounds as the
    /// union of its children, stopping as soon as an ancestor already
    /// contains that union. `start` is the node whose child pointer was
    /// just rewired by `insert` (the sibling's former parent) — the freshly
    /// allocated interior node below it already holds the exact union of
    /// its own two children, so refitting begins one level above it.
    fn refit_from(&mut self, start: Option<NodeIdx>) {
        let mut cur = start;
        while let Some(idx) = cur {
            let (left, right) = self
                .pool
                .get(idx)
                .children()
                .expect("refit only visits interior nodes");
            let union = self.pool.get(left).bounds.union(self.pool.get(right).bounds);
            if self.pool.get(idx).bounds.contains(union) {
                break;
            }
            self.pool.get_mut(idx).bounds = union.inflated(self.inflation);
            cur = self.pool.get(idx).parent;
        }
    }

    fn replace_child(&mut self, parent: NodeIdx, old_child: NodeIdx, new_child: NodeIdx) {
        match &mut self.pool.get_mut(parent).kind {
            NodeKind::Internal { left, right } => {
                if *left == old_child {
                    *left = new_child;
                } else {
                    debug_assert_eq!(*right, old_child, "old_child must be a child of parent");
                    *right = new_child;
                }
            }
            NodeKind::Leaf(_) => unreachable!("parent of a rewired child is always interior"),
        }
    }
}

impl<Item: Copy + Eq + Hash> Default for Bvh<Item> {
    fn default() -> Self {
        Self::new(16)
    }
}

impl<Item: Copy + Eq + Hash + core::fmt::Debug> core::fmt::Debug for Bvh<Item> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bvh")
            .field("len", &self.items.len())
            .field("capacity", &self.pool.capacity())
            .field("has_root", &self.root.is_some())
            .field("inflation", &self.inflation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<Item: Copy + Eq + Hash> Bvh<Item> {
    /// Check that the tree rooted at `root` is well-formed: every leaf is
    /// indexed, every interior bound contains its children's union, parent
    /// pointers agree with child pointers, and the reachable set has exactly
    /// `2 * len - 1` nodes. Intended for tests only.
    pub(crate) fn check_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.items.len(), 0);
            return;
        };

        let mut reachable = alloc::collections::BTreeSet::new();
        let mut leaf_count = 0usize;
        let mut stack = Vec::new();
        stack.push(root);
        while let Some(idx) = stack.pop() {
            assert!(reachable.insert(idx.get()), "node visited twice: cycle?");
            let node = self.pool.get(idx);
            if let Some(parent) = node.parent {
                let (l, r) = self
                    .pool
                    .get(parent)
                    .children()
                    .expect("parent must be interior");
                assert!(l == idx || r == idx, "parent must list this node as a child");
            } else {
                assert_eq!(idx, root, "only the root may have no parent");
            }
            match node.kind {
                NodeKind::Leaf(item) => {
                    leaf_count += 1;
                    assert_eq!(self.items.get(&item), Some(idx));
                }
                NodeKind::Internal { left, right } => {
                    let u = self.pool.get(left).bounds.union(self.pool.get(right).bounds);
                    assert!(node.bounds.contains(u));
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        assert_eq!(leaf_count, self.items.len());
        let total = if leaf_count == 0 { 0 } else { 2 * leaf_count - 1 };
        assert_eq!(reachable.len(), total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn cube(x: f32, y: f32, z: f32, side: f32) -> Bounds {
        Bounds::new(Vec3::new(x, y, z), Vec3::splat(side))
    }

    #[test]
    fn two_element_insert_builds_expected_union() {
        let mut bvh: Bvh<u32> = Bvh::new(4);
        assert!(bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0)));
        assert!(bvh.insert(2, cube(10.0, 0.0, 0.0, 1.0)));
        bvh.check_invariants();

        let mut seen = Vec::new();
        bvh.traversal(|_| true, |item| seen.push(item));
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn sah_descent_picks_nearer_sibling() {
        let mut bvh: Bvh<u32> = Bvh::new(4);
        bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0));
        bvh.insert(2, cube(10.0, 0.0, 0.0, 1.0));
        bvh.insert(3, cube(0.1, 0.0, 0.0, 1.0));
        bvh.check_invariants();

        // C's sibling must be A, not B: A is far cheaper to enlarge.
        let leaf_a = bvh.items.get(&1).unwrap();
        let leaf_c = bvh.items.get(&3).unwrap();
        let parent_a = bvh.pool.get(leaf_a).parent;
        let parent_c = bvh.pool.get(leaf_c).parent;
        assert_eq!(parent_a, parent_c, "A and C must share an immediate parent");

        let (left, right) = bvh
            .pool
            .get(parent_a.unwrap())
            .children()
            .expect("parent must be interior");
        assert!(
            (left == leaf_a && right == leaf_c) || (left == leaf_c && right == leaf_a),
            "A and C's parent must have exactly {{A, C}} as children"
        );
    }

    #[test]
    fn remove_restructures_and_frees_slots() {
        let mut bvh: Bvh<u32> = Bvh::new(4);
        bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0));
        bvh.insert(2, cube(10.0, 0.0, 0.0, 1.0));
        bvh.insert(3, cube(0.1, 0.0, 0.0, 1.0));

        assert!(bvh.remove(&2));
        bvh.check_invariants();
        assert_eq!(bvh.len(), 2);

        let mut seen = Vec::new();
        bvh.traversal(|_| true, |item| seen.push(item));
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn insert_remove_round_trip_empties_the_tree() {
        let mut bvh: Bvh<u32> = Bvh::new(2);
        for i in 0..20u32 {
            bvh.insert(i, cube(i as f32, 0.0, 0.0, 1.0));
        }
        bvh.check_invariants();
        for i in (0..20u32).rev() {
            assert!(bvh.remove(&i));
        }
        assert_eq!(bvh.len(), 0);
        assert!(bvh.is_empty());

        let mut count = 0;
        bvh.traversal(|_| true, |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut bvh: Bvh<u32> = Bvh::new(2);
        assert!(bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0)));
        assert!(!bvh.insert(1, cube(5.0, 0.0, 0.0, 1.0)));
        assert_eq!(bvh.len(), 1);
    }

    #[test]
    fn remove_missing_item_returns_false() {
        let mut bvh: Bvh<u32> = Bvh::new(2);
        assert!(!bvh.remove(&42));
    }

    #[test]
    fn empty_tree_traversal_and_bottom_up_are_no_ops() {
        let mut bvh: Bvh<u32> = Bvh::new(2);
        let mut count = 0;
        bvh.traversal(|_| true, |_| count += 1);
        assert_eq!(count, 0);
        bvh.bottom_up(); // must not panic
        assert!(bvh.is_empty());
    }

    #[test]
    fn single_element_tree_root_is_that_leaf() {
        let mut bvh: Bvh<u32> = Bvh::new(2);
        bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0));
        assert_eq!(bvh.root, bvh.items.get(&1));
        assert!(bvh.remove(&1));
        assert!(bvh.root.is_none());
    }

    #[test]
    fn pool_growth_keeps_all_slots_valid() {
        let mut bvh: Bvh<u32> = Bvh::new(1);
        let cap0 = bvh.capacity();
        for i in 0..(cap0 as u32 + 1) {
            assert!(bvh.insert(i, cube(i as f32 * 2.0, 0.0, 0.0, 1.0)));
        }
        bvh.check_invariants();
        assert!(bvh.capacity() > cap0);

        let mut seen = Vec::new();
        bvh.traversal(|_| true, |item| seen.push(item));
        seen.sort_unstable();
        assert_eq!(seen, (0..(cap0 as u32 + 1)).collect::<Vec<_>>());
    }

    #[test]
    fn pool_reuse_does_not_exceed_first_batch_peak() {
        let mut bvh: Bvh<u32> = Bvh::new(4);
        for i in 0..50u32 {
            bvh.insert(i, cube(i as f32, 0.0, 0.0, 1.0));
        }
        let peak = bvh.capacity();
        for i in 0..50u32 {
            bvh.remove(&i);
        }
        for i in 0..50u32 {
            bvh.insert(i + 100, cube(i as f32, 0.0, 0.0, 1.0));
        }
        assert!(bvh.capacity() <= peak);
    }

    #[test]
    fn bottom_up_on_single_element_is_a_no_op_shape() {
        let mut bvh: Bvh<u32> = Bvh::new(2);
        bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0));
        bvh.bottom_up();
        bvh.check_invariants();
        assert_eq!(bvh.len(), 1);
        let mut seen = Vec::new();
        bvh.traversal(|_| true, |item| seen.push(item));
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn bottom_up_refit_is_tight_and_deterministic_over_random_input() {
        use rand::Rng;

        let mut bvh: Bvh<u32> = Bvh::new(16);
        let mut rng = rand::thread_rng();
        for i in 0..1000u32 {
            let x: f32 = rng.gen_range(-0.5..0.5);
            let y: f32 = rng.gen_range(-0.5..0.5);
            let z: f32 = rng.gen_range(-0.5..0.5);
            bvh.insert(i, cube(x, y, z, 0.01));
        }
        bvh.bottom_up();
        bvh.check_invariants();
        assert_eq!(bvh.len(), 1000);

        // Tightness: every interior node's bounds equal (not merely contain)
        // the union of its children, since `inflation` defaults to 1.0.
        let root = bvh.root.expect("non-empty tree has a root");
        let mut stack = alloc::vec![root];
        while let Some(idx) = stack.pop() {
            let node = bvh.pool.get(idx);
            if let NodeKind::Internal { left, right } = node.kind {
                let u = bvh.pool.get(left).bounds.union(bvh.pool.get(right).bounds);
                assert_eq!(node.bounds, u);
                stack.push(left);
                stack.push(right);
            }
        }

        let mut visited = 0;
        bvh.traversal(|_| true, |_| visited += 1);
        assert_eq!(visited, 1000);
    }

    #[test]
    fn traversal_soundness_for_slab_ray_test() {
        // Build a scattered set of boxes and confirm traversal with a slab
        // ray-AABB predicate visits exactly the leaves the ray actually hits,
        // matching brute-force enumeration.
        let mut bvh: Bvh<u32> = Bvh::new(8);
        let mut boxes = Vec::new();
        for i in 0..64u32 {
            let x = (i % 8) as f32 * 3.0;
            let y = (i / 8) as f32 * 3.0;
            let b = cube(x, y, 0.0, 1.0);
            bvh.insert(i, b);
            boxes.push((i, b));
        }
        bvh.bottom_up();
        bvh.check_invariants();

        let origin = Vec3::new(-1.0, 1.0, 0.5);
        let dir = Vec3::new(1.0, 0.0, 0.0);

        fn slab_hit(b: Bounds, origin: Vec3, dir: Vec3) -> bool {
            let (min, max) = (b.min(), b.max());
            let mut t_near = f32::NEG_INFINITY;
            let mut t_far = f32::INFINITY;
            for axis in 0..3 {
                let o = origin[axis];
                let d = dir[axis];
                let (mn, mx) = (min[axis], max[axis]);
                if d == 0.0 {
                    if o < mn || o > mx {
                        return false;
                    }
                    continue;
                }
                let mut t0 = (mn - o) / d;
                let mut t1 = (mx - o) / d;
                if t0 > t1 {
                    core::mem::swap(&mut t0, &mut t1);
                }
                t_near = t_near.max(t0);
                t_far = t_far.min(t1);
                if t_near > t_far {
                    return false;
                }
            }
            true
        }

        let mut expected: Vec<u32> = boxes
            .iter()
            .filter(|&&(_, b)| slab_hit(b, origin, dir))
            .map(|&(id, _)| id)
            .collect();
        expected.sort_unstable();

        let mut visited = Vec::new();
        bvh.traversal(
            |b| slab_hit(b, origin, dir),
            |item| {
                visited.push(item);
            },
        );
        visited.sort_unstable();

        assert_eq!(visited, expected);
    }

    #[test]
    fn update_moves_an_item() {
        let mut bvh: Bvh<u32> = Bvh::new(4);
        bvh.insert(1, cube(0.0, 0.0, 0.0, 1.0));
        bvh.insert(2, cube(10.0, 0.0, 0.0, 1.0));

        assert!(bvh.update(1, cube(20.0, 0.0, 0.0, 1.0)));
        bvh.check_invariants();
        assert_eq!(bvh.len(), 2);

        assert!(!bvh.update(99, cube(0.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn inflation_factor_one_matches_default_refit() {
        let mut a: Bvh<u32> = Bvh::new(4);
        let mut b: Bvh<u32> = Bvh::new(4).with_inflation(1.0);
        for i in 0..10u32 {
            let bounds = cube(i as f32 * 1.3, 0.0, 0.0, 1.0);
            a.insert(i, bounds);
            b.insert(i, bounds);
        }
        a.check_invariants();
        b.check_invariants();
        assert_eq!(a.pool.get(a.root.unwrap()).bounds, b.pool.get(b.root.unwrap()).bounds);
    }
}
