//! A dynamic AABB tree for speeding up collision detection and other spatial queries.
//!
//! Leaves store "fat" AABBs padded with a margin,
//! so that objects can move a little without the tree needing an update.
//! The tree is kept balanced with AVL-style rotations on every insertion and removal.

use std::cell::RefCell;

use super::{
    aabb::{RayCastInput, AABB},
    CollisionError,
};
use crate::{
    math::{self as m, Vec2},
    settings::{AABB_MARGIN, AABB_MULTIPLIER},
};

//
// Parameters
//

/// Parameters for the creation of a dynamic tree.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct TreeParams {
    /// Distance to pad every stored AABB by in all directions.
    /// Larger margins mean fewer tree updates but more false positives in queries.
    pub aabb_margin: f64,
    /// How far ahead in the direction of motion to extend a moved AABB,
    /// as a multiple of the displacement given to `move_proxy`.
    pub displacement_multiplier: f64,
    /// How many nodes to initially allocate space for.
    /// More space will be allocated as needed.
    pub initial_capacity: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            aabb_margin: AABB_MARGIN,
            displacement_multiplier: AABB_MULTIPLIER,
            initial_capacity: 16,
        }
    }
}

//
// Internal types
//

/// Handle to a leaf of a [`DynamicTree`].
///
/// Stays valid until the proxy is destroyed, including across moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(pub(crate) usize);

impl ProxyId {
    /// Index of the proxy's node in the tree's node pool.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug)]
struct Node<T> {
    aabb: AABB,
    parent: Option<usize>,
    kind: NodeKind<T>,
    /// Leaf = 0, free node = -1.
    height: i32,
    /// Set when a leaf is inserted or reinserted, for the broad phase to pick up.
    moved: bool,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind<T> {
    Free { next: Option<usize> },
    Leaf { data: T },
    Branch { child1: usize, child2: usize },
}

impl<T> Node<T> {
    fn free(next: Option<usize>) -> Self {
        Node {
            aabb: AABB::new(Vec2::zero(), Vec2::zero()),
            parent: None,
            kind: NodeKind::Free { next },
            height: -1,
            moved: false,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

//
// Tree itself
//

/// A dynamic AABB tree holding a `T` in each leaf.
///
/// Nodes live in a pool that grows as needed and are recycled through a free list,
/// so proxy ids are plain indices.
#[derive(Clone, Debug)]
pub struct DynamicTree<T: Copy> {
    nodes: Vec<Node<T>>,
    root: Option<usize>,
    free_list: Option<usize>,
    /// Number of nodes in use, both leaves and branches.
    node_count: usize,
    params: TreeParams,
    /// Traversal stack kept around so that queries don't need to allocate.
    /// Taken out for the duration of a query, so nested queries get a fresh one.
    stack: RefCell<Vec<usize>>,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new(params: TreeParams) -> Self {
        let capacity = params.initial_capacity.max(1);
        Self {
            nodes: free_chain(0, capacity).collect(),
            root: None,
            free_list: Some(0),
            node_count: 0,
            params,
            stack: RefCell::new(Vec::new()),
        }
    }

    #[inline]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    //
    // Proxies
    //

    /// Create a proxy for an object with the given tight AABB.
    /// The stored AABB is padded by the tree's margin.
    pub fn create_proxy(&mut self, aabb: AABB, data: T) -> ProxyId {
        let fat_aabb = aabb.padded(self.params.aabb_margin);
        let leaf = self.allocate_node(fat_aabb, NodeKind::Leaf { data }, 0);
        self.nodes[leaf].moved = true;
        self.insert_leaf(leaf);
        ProxyId(leaf)
    }

    pub fn destroy_proxy(&mut self, id: ProxyId) {
        self.assert_leaf(id);
        self.remove_leaf(id.0);
        self.free_node(id.0);
    }

    /// Update the proxy for an object whose tight AABB is now `aabb`
    /// after moving by `displacement`.
    ///
    /// The proxy is only reinserted if `aabb` has escaped the stored fat AABB,
    /// or if the fat AABB has become much larger than needed.
    /// Returns whether the proxy was reinserted.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: AABB, displacement: Vec2) -> bool {
        self.assert_leaf(id);
        debug_assert!(aabb.is_valid());

        // extend the AABB, then predict its movement
        let r = self.params.aabb_margin;
        let mut fat_aabb = aabb.padded(r);
        let d = self.params.displacement_multiplier * displacement;
        if d.x < 0.0 {
            fat_aabb.min.x += d.x;
        } else {
            fat_aabb.max.x += d.x;
        }
        if d.y < 0.0 {
            fat_aabb.min.y += d.y;
        } else {
            fat_aabb.max.y += d.y;
        }

        let tree_aabb = self.nodes[id.0].aabb;
        if tree_aabb.contains(&aabb) {
            // the tree AABB still contains the object, but it might be too large
            // if the object was moving fast and has since slowed down
            let huge_aabb = fat_aabb.padded(4.0 * r);
            if huge_aabb.contains(&tree_aabb) {
                return false;
            }
        }

        self.remove_leaf(id.0);
        self.nodes[id.0].aabb = fat_aabb;
        self.insert_leaf(id.0);
        self.nodes[id.0].moved = true;
        true
    }

    #[inline]
    pub fn user_data(&self, id: ProxyId) -> T {
        match self.nodes[id.0].kind {
            NodeKind::Leaf { data } => data,
            _ => panic!("Proxy {} is not a leaf of the tree", id.0),
        }
    }

    #[inline]
    pub fn fat_aabb(&self, id: ProxyId) -> AABB {
        self.assert_leaf(id);
        self.nodes[id.0].aabb
    }

    #[inline]
    pub fn was_moved(&self, id: ProxyId) -> bool {
        self.assert_leaf(id);
        self.nodes[id.0].moved
    }

    /// Flag a proxy as moved without touching its AABB.
    #[inline]
    pub fn mark_moved(&mut self, id: ProxyId) {
        self.assert_leaf(id);
        self.nodes[id.0].moved = true;
    }

    #[inline]
    pub fn clear_moved(&mut self, id: ProxyId) {
        self.assert_leaf(id);
        self.nodes[id.0].moved = false;
    }

    #[inline]
    fn assert_leaf(&self, id: ProxyId) {
        assert!(
            self.nodes.get(id.0).map_or(false, Node::is_leaf),
            "Proxy {} is not a leaf of the tree",
            id.0
        );
    }

    //
    // Queries
    //

    /// Call `callback` with every proxy whose fat AABB overlaps `aabb`.
    /// Return `false` from the callback to stop the query early.
    pub fn query(&self, aabb: &AABB, mut callback: impl FnMut(ProxyId) -> bool) {
        let mut stack = self.take_stack();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { .. } => {
                    if !callback(ProxyId(idx)) {
                        break;
                    }
                }
                NodeKind::Branch { child1, child2 } => {
                    stack.push(child1);
                    stack.push(child2);
                }
                NodeKind::Free { .. } => panic!("Bug in dynamic tree: free node reachable from root"),
            }
        }
        self.stack.replace(stack);
    }

    /// Cast a ray against the proxies in the tree.
    ///
    /// `callback` is called with every proxy whose fat AABB the ray passes through,
    /// along with the ray clipped to the closest hit reported so far.
    /// Its return value controls the rest of the cast:
    /// - `0` stops the cast,
    /// - a negative value ignores this proxy,
    /// - a positive value clips the ray to that fraction.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId) -> f64,
    ) -> Result<(), CollisionError> {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = p2 - p1;
        if r.mag_sq() <= 0.0 {
            return Err(CollisionError::DegenerateRay);
        }

        // v is perpendicular to the segment
        let v = m::left_normal(r.normalized());
        let abs_v = m::abs(v);

        // separating axis for segment (Gino, p80):
        // |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;
        let mut segment_aabb = AABB::from_points(p1, p1 + max_fraction * r);

        let mut stack = self.take_stack();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { .. } => {
                    let sub_input = RayCastInput {
                        p1,
                        p2,
                        max_fraction,
                    };
                    let value = callback(&sub_input, ProxyId(idx));
                    if value == 0.0 {
                        // the client has terminated the ray cast
                        break;
                    }
                    if value > 0.0 {
                        max_fraction = value;
                        segment_aabb = AABB::from_points(p1, p1 + max_fraction * r);
                    }
                }
                NodeKind::Branch { child1, child2 } => {
                    stack.push(child1);
                    stack.push(child2);
                }
                NodeKind::Free { .. } => panic!("Bug in dynamic tree: free node reachable from root"),
            }
        }
        self.stack.replace(stack);

        Ok(())
    }

    /// Take the shared traversal stack, primed with the root.
    fn take_stack(&self) -> Vec<usize> {
        let mut stack = self.stack.take();
        stack.clear();
        stack.extend(self.root);
        stack
    }

    //
    // Diagnostics
    //

    /// Height of the tree. An empty tree and a single leaf both have height 0.
    pub fn height(&self) -> i32 {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    /// Maximum height difference between the children of any branch.
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter(|node| node.height > 1)
            .map(|node| {
                let (child1, child2) = self.children_of(node);
                (self.nodes[child2].height - self.nodes[child1].height).abs()
            })
            .max()
            .unwrap_or(0)
    }

    /// Ratio of the summed perimeters of all nodes to the perimeter of the root.
    /// Smaller is better.
    pub fn area_ratio(&self) -> f64 {
        let root = match self.root {
            Some(root) => root,
            None => return 0.0,
        };
        let root_area = self.nodes[root].aabb.perimeter();
        let total_area: f64 = self
            .nodes
            .iter()
            .filter(|node| node.height >= 0)
            .map(|node| node.aabb.perimeter())
            .sum();
        total_area / root_area
    }

    /// Number of nodes in use, counting both leaves and branches.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Check that the tree is internally consistent, panicking if not.
    pub fn validate(&self) {
        // (node, expected parent, depth)
        let mut stack: Vec<(usize, Option<usize>, i32)> =
            self.root.into_iter().map(|root| (root, None, 0)).collect();
        let mut computed_height = 0;
        while let Some((idx, expected_parent, depth)) = stack.pop() {
            let node = &self.nodes[idx];
            assert_eq!(node.parent, expected_parent, "Wrong parent on node {}", idx);
            match node.kind {
                NodeKind::Leaf { .. } => {
                    assert_eq!(node.height, 0, "Leaf {} has nonzero height", idx);
                    computed_height = computed_height.max(depth);
                }
                NodeKind::Branch { child1, child2 } => {
                    let (n1, n2) = (&self.nodes[child1], &self.nodes[child2]);
                    assert_eq!(
                        node.height,
                        1 + n1.height.max(n2.height),
                        "Wrong height on node {}",
                        idx
                    );
                    let union = n1.aabb.union(&n2.aabb);
                    assert_eq!(node.aabb.min, union.min, "Wrong AABB on node {}", idx);
                    assert_eq!(node.aabb.max, union.max, "Wrong AABB on node {}", idx);

                    stack.push((child1, Some(idx), depth + 1));
                    stack.push((child2, Some(idx), depth + 1));
                }
                NodeKind::Free { .. } => panic!("Free node {} reachable from root", idx),
            }
        }
        assert_eq!(self.height(), computed_height, "Stored height is wrong");

        let mut free_count = 0;
        let mut free_idx = self.free_list;
        while let Some(idx) = free_idx {
            match self.nodes[idx].kind {
                NodeKind::Free { next } => {
                    assert_eq!(self.nodes[idx].height, -1);
                    free_idx = next;
                    free_count += 1;
                }
                _ => panic!("Live node {} on the free list", idx),
            }
        }
        assert_eq!(
            self.node_count + free_count,
            self.nodes.len(),
            "Leaked nodes"
        );
    }

    //
    // Whole-tree operations
    //

    /// Rebuild the tree from scratch by greedily pairing the nodes
    /// whose union has the smallest perimeter.
    ///
    /// This is quadratic in the number of proxies, but usually gives a better tree
    /// than incremental insertion. Proxy ids stay the same.
    pub fn rebuild_bottom_up(&mut self) {
        let _span = tracy_span!("rebuild tree bottom-up", "rebuild_bottom_up");

        let mut leaves: Vec<usize> = Vec::with_capacity(self.node_count);
        for idx in 0..self.nodes.len() {
            match self.nodes[idx].kind {
                NodeKind::Free { .. } => {}
                NodeKind::Leaf { .. } => {
                    self.nodes[idx].parent = None;
                    leaves.push(idx);
                }
                NodeKind::Branch { .. } => self.free_node(idx),
            }
        }
        log::trace!("Rebuilding dynamic tree with {} leaves", leaves.len());

        while leaves.len() > 1 {
            let mut min_cost = f64::MAX;
            let (mut i_min, mut j_min) = (0, 1);
            for i in 0..leaves.len() {
                let aabb_i = self.nodes[leaves[i]].aabb;
                for j in (i + 1)..leaves.len() {
                    let cost = aabb_i.union(&self.nodes[leaves[j]].aabb).perimeter();
                    if cost < min_cost {
                        i_min = i;
                        j_min = j;
                        min_cost = cost;
                    }
                }
            }

            let child1 = leaves[i_min];
            let child2 = leaves[j_min];
            let parent = self.allocate_node(
                self.nodes[child1].aabb.union(&self.nodes[child2].aabb),
                NodeKind::Branch { child1, child2 },
                1 + self.nodes[child1].height.max(self.nodes[child2].height),
            );
            self.nodes[child1].parent = Some(parent);
            self.nodes[child2].parent = Some(parent);

            leaves[i_min] = parent;
            leaves.swap_remove(j_min);
        }

        self.root = leaves.first().copied();
        if let Some(root) = self.root {
            self.nodes[root].parent = None;
        }

        #[cfg(debug_assertions)]
        self.validate();
    }

    /// Move the origin of the tree's coordinate system to `new_origin`,
    /// i.e. subtract it from every stored AABB.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in self.nodes.iter_mut().filter(|node| node.height >= 0) {
            node.aabb.min -= new_origin;
            node.aabb.max -= new_origin;
        }
    }

    //
    // Node pool
    //

    fn allocate_node(&mut self, aabb: AABB, kind: NodeKind<T>, height: i32) -> usize {
        let idx = match self.free_list {
            Some(idx) => idx,
            None => {
                // the pool is full, double its size
                let old_capacity = self.nodes.len();
                let new_capacity = 2 * old_capacity.max(1);
                log::debug!(
                    "Growing dynamic tree node pool from {} to {}",
                    old_capacity,
                    new_capacity
                );
                self.nodes.extend(free_chain(old_capacity, new_capacity));
                old_capacity
            }
        };

        self.free_list = match self.nodes[idx].kind {
            NodeKind::Free { next } => next,
            _ => panic!("Bug in dynamic tree: live node {} on the free list", idx),
        };
        self.nodes[idx] = Node {
            aabb,
            parent: None,
            kind,
            height,
            moved: false,
        };
        self.node_count += 1;
        idx
    }

    fn free_node(&mut self, idx: usize) {
        debug_assert!(self.node_count > 0);
        self.nodes[idx] = Node::free(self.free_list);
        self.free_list = Some(idx);
        self.node_count -= 1;
    }

    #[inline]
    fn children(&self, idx: usize) -> (usize, usize) {
        self.children_of(&self.nodes[idx])
    }

    #[inline]
    fn children_of(&self, node: &Node<T>) -> (usize, usize) {
        match node.kind {
            NodeKind::Branch { child1, child2 } => (child1, child2),
            _ => panic!("Bug in dynamic tree: expected a branch node"),
        }
    }

    /// Point `parent` to `new_child` where it used to point to `old_child`.
    fn replace_child(&mut self, parent: usize, old_child: usize, new_child: usize) {
        let (child1, child2) = self.children(parent);
        self.nodes[parent].kind = if child1 == old_child {
            NodeKind::Branch {
                child1: new_child,
                child2,
            }
        } else {
            debug_assert_eq!(child2, old_child);
            NodeKind::Branch {
                child1,
                child2: new_child,
            }
        };
    }

    /// Recompute the height and AABB of a branch from its children.
    #[inline]
    fn refit(&mut self, idx: usize) {
        let (child1, child2) = self.children(idx);
        let (n1, n2) = (&self.nodes[child1], &self.nodes[child2]);
        let height = 1 + n1.height.max(n2.height);
        let aabb = n1.aabb.union(&n2.aabb);
        let node = &mut self.nodes[idx];
        node.height = height;
        node.aabb = aabb;
    }

    /// Walk from `start` to the root, balancing and refitting every node on the way.
    fn refit_upwards(&mut self, start: Option<usize>) {
        let mut next = start;
        while let Some(idx) = next {
            let idx = self.balance(idx);
            self.refit(idx);
            next = self.nodes[idx].parent;
        }
    }

    //
    // Insertion and removal
    //

    fn insert_leaf(&mut self, leaf: usize) {
        let root = match self.root {
            Some(root) => root,
            None => {
                self.root = Some(leaf);
                self.nodes[leaf].parent = None;
                return;
            }
        };

        // find the best sibling for this node
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut idx = root;
        while let NodeKind::Branch { child1, child2 } = self.nodes[idx].kind {
            let area = self.nodes[idx].aabb.perimeter();
            let combined_area = self.nodes[idx].aabb.union(&leaf_aabb).perimeter();

            // cost of creating a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;
            // minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let descend_cost = |child: usize| {
                let child_node = &self.nodes[child];
                let union_perimeter = leaf_aabb.union(&child_node.aabb).perimeter();
                if child_node.is_leaf() {
                    union_perimeter + inheritance_cost
                } else {
                    union_perimeter - child_node.aabb.perimeter() + inheritance_cost
                }
            };
            let cost1 = descend_cost(child1);
            let cost2 = descend_cost(child2);

            if cost < cost1 && cost < cost2 {
                break;
            }
            idx = if cost1 < cost2 { child1 } else { child2 };
        }
        let sibling = idx;

        // create a new parent joining the sibling and the leaf
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node(
            leaf_aabb.union(&self.nodes[sibling].aabb),
            NodeKind::Branch {
                child1: sibling,
                child2: leaf,
            },
            self.nodes[sibling].height + 1,
        );
        self.nodes[new_parent].parent = old_parent;
        match old_parent {
            Some(old_parent) => self.replace_child(old_parent, sibling, new_parent),
            None => self.root = Some(new_parent),
        }
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        self.refit_upwards(old_parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = match self.nodes[leaf].parent {
            Some(parent) => parent,
            None => panic!("Bug in dynamic tree: non-root leaf {} has no parent", leaf),
        };
        let grand_parent = self.nodes[parent].parent;
        let (child1, child2) = self.children(parent);
        let sibling = if child1 == leaf { child2 } else { child1 };

        // splice the sibling into the parent's place
        match grand_parent {
            Some(grand_parent) => {
                self.replace_child(grand_parent, parent, sibling);
                self.nodes[sibling].parent = Some(grand_parent);
                self.free_node(parent);
                self.refit_upwards(Some(grand_parent));
            }
            None => {
                self.root = Some(sibling);
                self.nodes[sibling].parent = None;
                self.free_node(parent);
            }
        }
        self.nodes[leaf].parent = None;
    }

    //
    // Balancing
    //

    /// Perform a left or right rotation if node `a` is imbalanced.
    /// Returns the new root of the subtree.
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let (b, c) = self.children(a);
        let balance = self.nodes[c].height - self.nodes[b].height;

        if balance > 1 {
            self.rotate_up(a, c, ChildSlot::Second)
        } else if balance < -1 {
            self.rotate_up(a, b, ChildSlot::First)
        } else {
            a
        }
    }

    /// Rotate `x`, which sits in `slot` of branch `a`, up into `a`'s place.
    /// `a` keeps its other child and takes the shorter of `x`'s children,
    /// `x` keeps the taller one and takes `a`.
    /// Returns `x`.
    fn rotate_up(&mut self, a: usize, x: usize, slot: ChildSlot) -> usize {
        let (f, g) = self.children(x);
        let (kept, moved) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };

        // swap a and x
        let a_parent = self.nodes[a].parent;
        self.nodes[x].parent = a_parent;
        self.nodes[a].parent = Some(x);
        match a_parent {
            Some(p) => self.replace_child(p, a, x),
            None => self.root = Some(x),
        }
        self.nodes[x].kind = NodeKind::Branch {
            child1: a,
            child2: kept,
        };

        // a takes over x's shorter child
        let (a1, a2) = self.children(a);
        self.nodes[a].kind = match slot {
            ChildSlot::First => NodeKind::Branch {
                child1: moved,
                child2: a2,
            },
            ChildSlot::Second => NodeKind::Branch {
                child1: a1,
                child2: moved,
            },
        };
        self.nodes[moved].parent = Some(a);

        self.refit(a);
        self.refit(x);
        x
    }
}

#[derive(Clone, Copy, Debug)]
enum ChildSlot {
    First,
    Second,
}

/// Free nodes for the index range `start..end`, linked in order.
fn free_chain<T>(start: usize, end: usize) -> impl Iterator<Item = Node<T>> {
    (start..end).map(move |idx| Node::free(if idx + 1 < end { Some(idx + 1) } else { None }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::assert_equal;
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    fn square(x: f64, y: f64, size: f64) -> AABB {
        AABB::new(Vec2::new(x, y), Vec2::new(x + size, y + size))
    }

    fn collect_query(tree: &DynamicTree<usize>, aabb: &AABB) -> Vec<usize> {
        let mut found = Vec::new();
        tree.query(aabb, |id| {
            found.push(tree.user_data(id));
            true
        });
        found.sort_unstable();
        found
    }

    #[test]
    fn random_insert_and_remove_keeps_tree_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree: DynamicTree<usize> = DynamicTree::new(TreeParams {
            initial_capacity: 4,
            ..Default::default()
        });
        let start_count = tree.node_count();

        // non-overlapping boxes on a grid, inserted in random order
        let mut cells: Vec<usize> = (0..100).collect();
        cells.shuffle(&mut rng);
        let mut ids = Vec::new();
        for cell in cells {
            let size = rng.gen_range(0.2..2.0);
            let aabb = square((cell % 10) as f64 * 3.0, (cell / 10) as f64 * 3.0, size);
            ids.push(tree.create_proxy(aabb, cell));
            tree.validate();
        }
        assert_eq!(tree.node_count(), 2 * 100 - 1);
        assert!(tree.height() < 25);
        assert!(tree.area_ratio() > 1.0);

        ids.shuffle(&mut rng);
        for id in ids {
            tree.destroy_proxy(id);
            tree.validate();
        }
        assert_eq!(tree.node_count(), start_count);
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.area_ratio(), 0.0);
    }

    #[test]
    fn query_finds_overlapping() {
        let mut tree = DynamicTree::default();
        tree.create_proxy(square(0.0, 0.0, 1.0), 0);
        tree.create_proxy(square(0.5, 0.5, 1.0), 1);
        tree.create_proxy(square(10.0, 10.0, 1.0), 2);
        tree.validate();

        let region = AABB::new(Vec2::zero(), Vec2::new(2.0, 2.0));
        assert_equal(collect_query(&tree, &region), [0, 1]);

        let far = square(9.0, 9.0, 3.0);
        assert_equal(collect_query(&tree, &far), [2]);

        // stopping early
        let mut count = 0;
        tree.query(&region, |_| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn small_moves_stay_in_fat_aabb() {
        let mut tree = DynamicTree::default();
        let id = tree.create_proxy(square(0.0, 0.0, 1.0), ());
        assert!(tree.was_moved(id));
        tree.clear_moved(id);

        let fat = tree.fat_aabb(id);
        assert!((fat.min.x + 0.1).abs() < 0.001);
        assert!((fat.max.x - 1.1).abs() < 0.001);

        let nudged = square(0.05, 0.0, 1.0);
        assert!(!tree.move_proxy(id, nudged, Vec2::new(0.05, 0.0)));
        assert!(!tree.was_moved(id));
        assert_eq!(tree.fat_aabb(id), fat);

        let far = square(5.0, 5.0, 1.0);
        assert!(tree.move_proxy(id, far, Vec2::new(5.0, 5.0)));
        assert!(tree.was_moved(id));
        let fat = tree.fat_aabb(id);
        assert!(fat.contains(&far));
        // extended in the direction of motion
        assert!((fat.max.x - (6.1 + 4.0 * 5.0)).abs() < 0.001);
        assert!((fat.min.x - 4.9).abs() < 0.001);
        tree.validate();
    }

    #[test]
    fn nested_and_repeated_queries() {
        let mut tree = DynamicTree::default();
        for i in 0..8 {
            tree.create_proxy(square(i as f64 * 2.0, 0.0, 1.0), i);
        }
        let everything = square(-1.0, -1.0, 20.0);
        let first = collect_query(&tree, &everything);
        assert_equal(first.iter().copied(), 0..8);

        // querying from inside a query callback
        let mut neighbor_counts = Vec::new();
        tree.query(&everything, |id| {
            let around = tree.fat_aabb(id).padded(1.5);
            neighbor_counts.push((tree.user_data(id), collect_query(&tree, &around).len()));
            true
        });
        neighbor_counts.sort_unstable();
        assert_equal(
            neighbor_counts,
            [(0, 2), (1, 3), (2, 3), (3, 3), (4, 3), (5, 3), (6, 3), (7, 2)],
        );

        // a query stopped early doesn't leave stale nodes behind for the next one
        let mut count = 0;
        tree.query(&everything, |_| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
        let input = RayCastInput {
            p1: Vec2::new(-1.0, 0.5),
            p2: Vec2::new(20.0, 0.5),
            max_fraction: 1.0,
        };
        tree.ray_cast(&input, |_, _| 0.0).expect("valid ray");
        assert_equal(collect_query(&tree, &everything), first);
        assert_equal(collect_query(&tree, &square(3.5, 0.0, 1.0)), [2]);
    }

    #[test]
    fn ray_cast_clips_to_closest() {
        let mut tree = DynamicTree::default();
        let near = tree.create_proxy(AABB::new(Vec2::new(2.0, -0.5), Vec2::new(3.0, 0.5)), 0);
        tree.create_proxy(AABB::new(Vec2::new(5.0, -0.5), Vec2::new(6.0, 0.5)), 1);
        tree.create_proxy(AABB::new(Vec2::new(5.0, 4.0), Vec2::new(6.0, 5.0)), 2);

        let input = RayCastInput {
            p1: Vec2::zero(),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };

        // report everything without clipping
        let mut hits = Vec::new();
        tree.ray_cast(&input, |sub_input, id| {
            hits.push(tree.user_data(id));
            sub_input.max_fraction
        })
        .expect("valid ray");
        hits.sort_unstable();
        assert_equal(hits, [0, 1]);

        // clip to the closest hit
        let mut closest = None;
        tree.ray_cast(&input, |sub_input, id| {
            match tree.fat_aabb(id).ray_cast(sub_input) {
                Some(out) => {
                    closest = Some((id, out.fraction));
                    out.fraction
                }
                None => -1.0,
            }
        })
        .expect("valid ray");
        let (id, fraction) = closest.expect("ray should hit");
        assert_eq!(id, near);
        assert!((fraction - 0.19).abs() < 0.001);

        // stop at the first hit
        let mut count = 0;
        tree.ray_cast(&input, |_, _| {
            count += 1;
            0.0
        })
        .expect("valid ray");
        assert_eq!(count, 1);

        let degenerate = RayCastInput {
            p1: Vec2::one(),
            p2: Vec2::one(),
            max_fraction: 1.0,
        };
        assert_eq!(
            tree.ray_cast(&degenerate, |_, _| 1.0),
            Err(CollisionError::DegenerateRay)
        );
    }

    #[test]
    fn sorted_insertion_stays_balanced() {
        let mut tree = DynamicTree::default();
        for i in 0..64 {
            tree.create_proxy(square(i as f64 * 2.0, 0.0, 1.0), i);
            tree.validate();
        }
        // without rotations this would degenerate into a list
        assert!(tree.height() < 16);
        assert_eq!(collect_query(&tree, &square(-1.0, -1.0, 200.0)).len(), 64);
    }

    #[test]
    fn bottom_up_rebuild() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree = DynamicTree::default();
        let ids: Vec<ProxyId> = (0..20)
            .map(|i| {
                let x = rng.gen_range(-50.0..50.0);
                let y = rng.gen_range(-50.0..50.0);
                tree.create_proxy(square(x, y, 1.0), i)
            })
            .collect();

        tree.rebuild_bottom_up();
        tree.validate();
        assert_eq!(tree.node_count(), 2 * 20 - 1);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(tree.user_data(*id), i);
        }
        assert_equal(
            collect_query(&tree, &square(-100.0, -100.0, 200.0)),
            0..20,
        );

        // still usable incrementally afterwards
        tree.destroy_proxy(ids[0]);
        tree.create_proxy(square(0.0, 0.0, 1.0), 20);
        tree.validate();
    }

    #[test]
    fn origin_shift() {
        let mut tree = DynamicTree::default();
        let id = tree.create_proxy(square(0.0, 0.0, 1.0), ());
        tree.create_proxy(square(3.0, 0.0, 1.0), ());
        tree.shift_origin(Vec2::new(10.0, 0.0));
        tree.validate();
        let fat = tree.fat_aabb(id);
        assert!((fat.min.x + 10.1).abs() < 0.001);
        assert!((fat.max.x + 8.9).abs() < 0.001);
    }

    #[cfg(feature = "serde-types")]
    #[test]
    fn params_from_ron() {
        let params: TreeParams = ron::from_str(
            "(aabb_margin: 0.2, displacement_multiplier: 2.0, initial_capacity: 64)",
        )
        .expect("valid params");
        assert_eq!(params.initial_capacity, 64);
        let tree: DynamicTree<()> = DynamicTree::new(params);
        assert_eq!(tree.params().aabb_margin, 0.2);
    }
}
