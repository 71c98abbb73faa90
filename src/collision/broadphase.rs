//! The broad phase is responsible for detecting pairs of possibly intersecting objects
//! for further, more accurate narrow phase inspection.

use super::{
    aabb::{RayCastInput, AABB},
    tree::{DynamicTree, ProxyId, TreeParams},
    CollisionError,
};
use crate::math::Vec2;

/// A broad phase built on a [`DynamicTree`].
///
/// Proxies that are created or move out of their fat AABB are buffered,
/// and only those are tested for new pairs in [`update_pairs`][Self::update_pairs].
#[derive(Clone, Debug)]
pub struct BroadPhase<T: Copy> {
    tree: DynamicTree<T>,
    proxy_count: usize,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new(params: TreeParams) -> Self {
        Self {
            tree: DynamicTree::new(params),
            proxy_count: 0,
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    /// Create a proxy with the given tight AABB.
    /// It will be checked for pairs on the next call to `update_pairs`.
    pub fn create_proxy(&mut self, aabb: AABB, data: T) -> ProxyId {
        let id = self.tree.create_proxy(aabb, data);
        self.proxy_count += 1;
        self.buffer_move(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: ProxyId) {
        self.move_buffer.retain(|&moved| moved != id);
        self.proxy_count -= 1;
        self.tree.destroy_proxy(id);
    }

    /// Move a proxy, buffering it for pair checks if it left its fat AABB.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: AABB, displacement: Vec2) {
        if self.tree.move_proxy(id, aabb, displacement) {
            self.buffer_move(id);
        }
    }

    /// Buffer a proxy for pair checks on the next update even though it hasn't moved.
    pub fn touch_proxy(&mut self, id: ProxyId) {
        self.buffer_move(id);
    }

    /// Each proxy is buffered at most once per update
    /// and flagged as moved in the tree while it's in the buffer.
    fn buffer_move(&mut self, id: ProxyId) {
        if !self.move_buffer.contains(&id) {
            self.move_buffer.push(id);
        }
        self.tree.mark_moved(id);
    }

    /// Find new pairs of overlapping proxies,
    /// calling `callback` with the user data of both proxies in each pair.
    ///
    /// Only pairs involving at least one proxy that moved since the last update are reported,
    /// each of them once.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(T, T)) {
        let _span = tracy_span!("update broad phase pairs", "update_pairs");

        self.pair_buffer.clear();
        let tree = &self.tree;
        let pairs = &mut self.pair_buffer;
        for &query_id in &self.move_buffer {
            // moved proxies that were destroyed were already removed from the buffer
            let fat_aabb = tree.fat_aabb(query_id);
            tree.query(&fat_aabb, |id| {
                if id == query_id {
                    return true;
                }
                // both proxies moved, only the one with the larger id reports the pair
                if tree.was_moved(id) && id > query_id {
                    return true;
                }
                pairs.push((id.min(query_id), id.max(query_id)));
                true
            });
        }
        // report a pair once even if it was found from both ends
        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        for &(id_a, id_b) in &self.pair_buffer {
            callback(self.tree.user_data(id_a), self.tree.user_data(id_b));
        }

        for id in self.move_buffer.drain(..) {
            self.tree.clear_moved(id);
        }
    }

    /// Check whether the fat AABBs of two proxies overlap.
    #[inline]
    pub fn test_overlap(&self, id_a: ProxyId, id_b: ProxyId) -> bool {
        self.tree.fat_aabb(id_a).overlaps(&self.tree.fat_aabb(id_b))
    }

    #[inline]
    pub fn fat_aabb(&self, id: ProxyId) -> AABB {
        self.tree.fat_aabb(id)
    }

    #[inline]
    pub fn user_data(&self, id: ProxyId) -> T {
        self.tree.user_data(id)
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// See [`DynamicTree::query`].
    pub fn query(&self, aabb: &AABB, callback: impl FnMut(ProxyId) -> bool) {
        self.tree.query(aabb, callback);
    }

    /// See [`DynamicTree::ray_cast`].
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        callback: impl FnMut(&RayCastInput, ProxyId) -> f64,
    ) -> Result<(), CollisionError> {
        self.tree.ray_cast(input, callback)
    }

    #[inline]
    pub fn tree_height(&self) -> i32 {
        self.tree.height()
    }

    #[inline]
    pub fn tree_balance(&self) -> i32 {
        self.tree.max_balance()
    }

    #[inline]
    pub fn tree_quality(&self) -> f64 {
        self.tree.area_ratio()
    }

    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }

    #[inline]
    pub fn tree(&self) -> &DynamicTree<T> {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::assert_equal;

    fn square(x: f64, y: f64, size: f64) -> AABB {
        AABB::new(Vec2::new(x, y), Vec2::new(x + size, y + size))
    }

    fn collect_pairs(bp: &mut BroadPhase<usize>) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn pairs_are_reported_once() {
        let mut bp = BroadPhase::default();
        let id0 = bp.create_proxy(square(0.0, 0.0, 1.0), 0);
        let id1 = bp.create_proxy(square(0.5, 0.5, 1.0), 1);
        let id2 = bp.create_proxy(square(10.0, 10.0, 1.0), 2);
        assert_eq!(bp.proxy_count(), 3);

        assert_equal(collect_pairs(&mut bp), [(0, 1)]);
        assert!(bp.test_overlap(id0, id1));
        assert!(!bp.test_overlap(id0, id2));

        // nothing moved since
        assert!(collect_pairs(&mut bp).is_empty());

        // a small move stays inside the fat AABB and isn't reported again
        bp.move_proxy(id1, square(0.52, 0.5, 1.0), Vec2::new(0.02, 0.0));
        assert!(collect_pairs(&mut bp).is_empty());

        bp.move_proxy(id2, square(0.2, 0.2, 1.0), Vec2::new(-9.8, -9.8));
        assert_equal(collect_pairs(&mut bp), [(0, 2), (1, 2)]);

        bp.destroy_proxy(id2);
        assert_eq!(bp.proxy_count(), 2);
        bp.touch_proxy(id0);
        assert_equal(collect_pairs(&mut bp), [(0, 1)]);
        bp.tree().validate();
    }

    #[test]
    fn repeated_moves_report_each_pair_once() {
        let mut bp = BroadPhase::default();
        let id0 = bp.create_proxy(square(0.0, 0.0, 1.0), 0);
        let id1 = bp.create_proxy(square(0.5, 0.0, 1.0), 1);
        assert_equal(collect_pairs(&mut bp), [(0, 1)]);

        // leave the fat AABB twice and get touched, all before one update
        bp.move_proxy(id1, square(3.0, 0.0, 1.0), Vec2::new(2.5, 0.0));
        bp.move_proxy(id1, square(0.5, 0.0, 1.0), Vec2::new(-2.5, 0.0));
        bp.touch_proxy(id1);
        assert!(bp.tree().was_moved(id1));
        assert!(!bp.tree().was_moved(id0));
        assert_equal(collect_pairs(&mut bp), [(0, 1)]);
        assert!(!bp.tree().was_moved(id1));

        // both ends of the pair buffered
        bp.touch_proxy(id0);
        bp.touch_proxy(id1);
        assert_equal(collect_pairs(&mut bp), [(0, 1)]);

        bp.move_proxy(id0, square(5.0, 0.0, 1.0), Vec2::new(5.0, 0.0));
        bp.move_proxy(id0, square(-5.0, 0.0, 1.0), Vec2::new(-10.0, 0.0));
        bp.move_proxy(id0, square(0.0, 0.0, 1.0), Vec2::new(5.0, 0.0));
        bp.touch_proxy(id1);
        assert_equal(collect_pairs(&mut bp), [(0, 1)]);

        assert!(collect_pairs(&mut bp).is_empty());
        bp.tree().validate();
    }

    #[test]
    fn destroyed_proxies_leave_the_move_buffer() {
        let mut bp = BroadPhase::default();
        bp.create_proxy(square(0.0, 0.0, 1.0), 0);
        let doomed = bp.create_proxy(square(0.5, 0.0, 1.0), 1);
        bp.destroy_proxy(doomed);
        assert!(collect_pairs(&mut bp).is_empty());
        assert_eq!(bp.tree_height(), 0);
    }

    #[test]
    fn queries_go_through_the_tree() {
        let mut bp = BroadPhase::default();
        for i in 0..10 {
            bp.create_proxy(square(i as f64 * 2.0, 0.0, 1.0), i);
        }
        bp.tree().validate();
        assert!(bp.tree_quality() >= 1.0);
        assert!(bp.tree_height() >= 3);

        let mut found = Vec::new();
        bp.query(&square(-0.5, -0.5, 4.0), |id| {
            found.push(bp.user_data(id));
            true
        });
        found.sort_unstable();
        assert_equal(found, [0, 1]);

        let input = RayCastInput {
            p1: Vec2::new(-1.0, 0.5),
            p2: Vec2::new(30.0, 0.5),
            max_fraction: 1.0,
        };
        let mut hits = 0;
        bp.ray_cast(&input, |sub_input, _| {
            hits += 1;
            sub_input.max_fraction
        })
        .expect("valid ray");
        assert_eq!(hits, 10);

        bp.shift_origin(Vec2::new(100.0, 0.0));
        bp.tree().validate();
        let mut found = 0;
        bp.query(&square(-100.5, -0.5, 4.0), |_| {
            found += 1;
            true
        });
        assert_eq!(found, 2);
    }
}
