//! Spatial index over taxi positions: a dynamic 2-d tree.
//!
//! This module provides:
//!
//! - **SpatialIndex**: insert, delete-by-value and k-nearest queries
//! - **TreeMetrics**: height and size, maintained incrementally
//! - **Balanced rebuilds**: triggered when the height drifts past a budget
//!
//! Nodes live in an arena (`Vec`) and reference their children by index; freed
//! slots are recycled. A point goes left iff its coordinate on the node's axis is
//! strictly less than the node's, so left subtrees hold strictly smaller and right
//! subtrees greater-or-equal coordinates. Deletion and rebuilds preserve that rule,
//! which lets exact-match lookups follow a single root-to-leaf path.
//!
//! Height convention: an empty tree has height 0, a single node height 1.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::DispatchError;
use crate::point::{Axis, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Rebuild the tree balanced once its height exceeds
    /// `ceil(factor * log2(size + 1)) + 1`. `None` disables rebuilds.
    pub rebuild_height_factor: Option<f64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            rebuild_height_factor: Some(2.0),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        match self.rebuild_height_factor {
            Some(factor) if !(factor.is_finite() && factor >= 1.0) => {
                Err(DispatchError::InvalidInput(format!(
                    "rebuild_height_factor must be >= 1, got {factor}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Structural health of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMetrics {
    pub height: usize,
    pub size: usize,
}

/// One k-nearest result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub point: Point,
    /// Straight-line distance to the query point.
    pub distance: f64,
    /// Insertion ticket of the taxi node; lower means inserted earlier.
    pub ticket: u64,
}

/// Broken structural invariant, reported by [`SpatialIndex::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("node {point} at depth {depth} splits on {actual:?}, expected {expected:?}")]
    WrongAxis {
        point: Point,
        depth: usize,
        expected: Axis,
        actual: Axis,
    },
    #[error("{point} violates the split of ancestor {ancestor} on {axis:?}")]
    SplitRule {
        point: Point,
        ancestor: Point,
        axis: Axis,
    },
    #[error("stored height {stored} of {point} differs from actual {actual}")]
    Height {
        point: Point,
        stored: usize,
        actual: usize,
    },
    #[error("size counter {counted} differs from reachable node count {reachable}")]
    Size { counted: usize, reachable: usize },
}

#[derive(Debug, Clone)]
struct KdNode {
    point: Point,
    ticket: u64,
    axis: Axis,
    left: Option<usize>,
    right: Option<usize>,
    height: usize,
}

/// Max-heap entry for the bounded k-nearest search; the top is the worst kept.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    dist2: OrderedFloat<f64>,
    ticket: u64,
    node: usize,
}

/// Dynamic 2-d tree of taxi positions.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    nodes: Vec<KdNode>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
    next_ticket: u64,
    config: IndexConfig,
    /// Height right after the last rebuild that could not get under budget.
    rebuild_floor: usize,
}

impl SpatialIndex {
    /// Create an empty index.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Build a balanced index. Tickets follow the order of `points`.
    pub fn from_points(points: &[Point], config: IndexConfig) -> Self {
        let mut index = Self::new(config);
        let mut entries: Vec<(Point, u64)> = points
            .iter()
            .copied()
            .zip(0u64..)
            .collect();
        debug_assert!(entries.iter().all(|(p, _)| p.is_valid()));
        index.next_ticket = entries.len() as u64;
        index.len = entries.len();
        index.root = index.build_balanced(&mut entries, 0);
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current height and size, O(1).
    pub fn metrics(&self) -> TreeMetrics {
        TreeMetrics {
            height: self.height_of(self.root),
            size: self.len,
        }
    }

    /// Insert a taxi at `point`. Equal coordinates descend right.
    ///
    /// Callers validate points at the boundary; a non-finite point here is a
    /// programming error.
    pub fn insert(&mut self, point: Point) {
        debug_assert!(point.is_valid(), "index points must be validated");
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let Some(mut current) = self.root else {
            let idx = self.alloc(point, ticket, Axis::X);
            self.root = Some(idx);
            self.len = 1;
            return;
        };

        let mut path = Vec::new();
        loop {
            path.push(current);
            let (axis, split, left, right) = self.split_of(current);
            let go_left = point.coord(axis) < split;
            let next = if go_left { left } else { right };
            match next {
                Some(child) => current = child,
                None => {
                    let idx = self.alloc(point, ticket, axis.next());
                    let parent = &mut self.nodes[current];
                    if go_left {
                        parent.left = Some(idx);
                    } else {
                        parent.right = Some(idx);
                    }
                    break;
                }
            }
        }

        for &idx in path.iter().rev() {
            self.refresh_height(idx);
        }
        self.len += 1;
        self.maybe_rebuild();
    }

    /// Remove one taxi sitting exactly at `point` (the one closest to the root
    /// when duplicates exist).
    pub fn delete(&mut self, point: Point) -> Result<(), DispatchError> {
        let target = self
            .find(point)
            .ok_or(DispatchError::TaxiNotFound { point })?;
        self.root = self.remove_node(self.root, target);
        self.len -= 1;
        self.maybe_rebuild();
        Ok(())
    }

    /// Whether a taxi sits exactly at `point`.
    pub fn contains(&self, point: Point) -> bool {
        self.find(point).is_some()
    }

    /// Up to `k` taxis by ascending straight-line distance to `query`; equal
    /// distances keep insertion order.
    pub fn k_nearest(&self, query: Point, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k.min(self.len) + 1);
        if let Some(root) = self.root {
            self.search(root, &query, k, &mut heap);
        }
        heap.into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                point: self.nodes[c.node].point,
                distance: c.dist2.0.sqrt(),
                ticket: c.ticket,
            })
            .collect()
    }

    /// All taxi positions in pre-order.
    pub fn points(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            out.push(node.point);
            stack.extend(node.right);
            stack.extend(node.left);
        }
        out
    }

    /// Rebuild the whole tree balanced, keeping insertion tickets.
    pub fn rebuild(&mut self) {
        let mut entries: Vec<(Point, u64)> = Vec::with_capacity(self.len);
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            entries.push((node.point, node.ticket));
            stack.extend(node.left);
            stack.extend(node.right);
        }
        self.nodes.clear();
        self.free.clear();
        self.root = self.build_balanced(&mut entries, 0);
    }

    /// Walk the whole tree and check axis alternation, the split rule, stored
    /// heights and the size counter.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut reachable = 0;
        let mut ancestors: Vec<(Point, Axis, bool)> = Vec::new();
        self.validate_subtree(self.root, 0, &mut ancestors, &mut reachable)?;
        if reachable != self.len {
            return Err(InvariantViolation::Size {
                counted: self.len,
                reachable,
            });
        }
        Ok(())
    }

    fn validate_subtree(
        &self,
        node: Option<usize>,
        depth: usize,
        ancestors: &mut Vec<(Point, Axis, bool)>,
        reachable: &mut usize,
    ) -> Result<usize, InvariantViolation> {
        let Some(idx) = node else {
            return Ok(0);
        };
        let current = &self.nodes[idx];
        *reachable += 1;

        let expected = Axis::for_depth(depth);
        if current.axis != expected {
            return Err(InvariantViolation::WrongAxis {
                point: current.point,
                depth,
                expected,
                actual: current.axis,
            });
        }
        for &(ancestor, axis, went_left) in ancestors.iter() {
            let ok = if went_left {
                current.point.coord(axis) < ancestor.coord(axis)
            } else {
                current.point.coord(axis) >= ancestor.coord(axis)
            };
            if !ok {
                return Err(InvariantViolation::SplitRule {
                    point: current.point,
                    ancestor,
                    axis,
                });
            }
        }

        ancestors.push((current.point, current.axis, true));
        let left = self.validate_subtree(current.left, depth + 1, ancestors, reachable);
        ancestors.pop();
        let left = left?;
        ancestors.push((current.point, current.axis, false));
        let right = self.validate_subtree(current.right, depth + 1, ancestors, reachable);
        ancestors.pop();
        let right = right?;

        let actual = 1 + left.max(right);
        if current.height != actual {
            return Err(InvariantViolation::Height {
                point: current.point,
                stored: current.height,
                actual,
            });
        }
        Ok(actual)
    }

    fn alloc(&mut self, point: Point, ticket: u64, axis: Axis) -> usize {
        let node = KdNode {
            point,
            ticket,
            axis,
            left: None,
            right: None,
            height: 1,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn split_of(&self, idx: usize) -> (Axis, f64, Option<usize>, Option<usize>) {
        let node = &self.nodes[idx];
        (node.axis, node.point.coord(node.axis), node.left, node.right)
    }

    fn height_of(&self, node: Option<usize>) -> usize {
        node.map_or(0, |idx| self.nodes[idx].height)
    }

    fn refresh_height(&mut self, idx: usize) {
        let node = &self.nodes[idx];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes[idx].height = height;
    }

    fn find(&self, point: Point) -> Option<usize> {
        let mut current = self.root;
        while let Some(idx) = current {
            let node = &self.nodes[idx];
            if node.point == point {
                return Some(idx);
            }
            current = if point.coord(node.axis) < node.point.coord(node.axis) {
                node.left
            } else {
                node.right
            };
        }
        None
    }

    /// Remove node `target` from the subtree rooted at `root` and return the new
    /// subtree root. `target` must be reachable by value from `root`.
    fn remove_node(&mut self, root: Option<usize>, target: usize) -> Option<usize> {
        let current = root?;
        let (axis, split, left, right) = self.split_of(current);

        if current != target {
            let target_point = self.nodes[target].point;
            if target_point.coord(axis) < split {
                let new_left = self.remove_node(left, target);
                self.nodes[current].left = new_left;
            } else {
                let new_right = self.remove_node(right, target);
                self.nodes[current].right = new_right;
            }
            self.refresh_height(current);
            return Some(current);
        }

        match (left, right) {
            (None, None) => {
                self.free.push(current);
                None
            }
            (_, Some(right)) => {
                let replacement = self.find_min(right, axis);
                let (point, ticket) = self.payload(replacement);
                let new_right = self.remove_node(Some(right), replacement);
                let node = &mut self.nodes[current];
                node.point = point;
                node.ticket = ticket;
                node.right = new_right;
                self.refresh_height(current);
                Some(current)
            }
            (Some(left), None) => {
                // Promote the left minimum and hang the rest of the left subtree
                // on the right: everything left is >= that minimum.
                let replacement = self.find_min(left, axis);
                let (point, ticket) = self.payload(replacement);
                let new_right = self.remove_node(Some(left), replacement);
                let node = &mut self.nodes[current];
                node.point = point;
                node.ticket = ticket;
                node.left = None;
                node.right = new_right;
                self.refresh_height(current);
                Some(current)
            }
        }
    }

    fn payload(&self, idx: usize) -> (Point, u64) {
        let node = &self.nodes[idx];
        (node.point, node.ticket)
    }

    /// Node holding the minimum coordinate on `dim` within the subtree.
    fn find_min(&self, idx: usize, dim: Axis) -> usize {
        let node = &self.nodes[idx];
        if node.axis == dim {
            return match node.left {
                Some(left) => self.find_min(left, dim),
                None => idx,
            };
        }
        let mut best = idx;
        for child in [node.left, node.right].into_iter().flatten() {
            let candidate = self.find_min(child, dim);
            if self.nodes[candidate].point.coord(dim) < self.nodes[best].point.coord(dim) {
                best = candidate;
            }
        }
        best
    }

    fn search(&self, idx: usize, query: &Point, k: usize, heap: &mut BinaryHeap<Candidate>) {
        let node = &self.nodes[idx];
        heap.push(Candidate {
            dist2: OrderedFloat(node.point.distance_squared(query)),
            ticket: node.ticket,
            node: idx,
        });
        if heap.len() > k {
            heap.pop();
        }

        let diff = query.coord(node.axis) - node.point.coord(node.axis);
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(near) = near {
            self.search(near, query, k, heap);
        }
        if let Some(far) = far {
            // Ties on the plane still have to be visited for the ticket tie-break.
            let worth_visiting =
                heap.len() < k || heap.peek().map_or(true, |worst| diff * diff <= worst.dist2.0);
            if worth_visiting {
                self.search(far, query, k, heap);
            }
        }
    }

    fn build_balanced(&mut self, entries: &mut [(Point, u64)], depth: usize) -> Option<usize> {
        if entries.is_empty() {
            return None;
        }
        let axis = Axis::for_depth(depth);
        entries.sort_by(|a, b| {
            a.0.coord(axis)
                .total_cmp(&b.0.coord(axis))
                .then(a.1.cmp(&b.1))
        });
        let mut mid = entries.len() / 2;
        // Equal coordinates must end up on the right of the pivot.
        while mid > 0 && entries[mid - 1].0.coord(axis) == entries[mid].0.coord(axis) {
            mid -= 1;
        }
        let (point, ticket) = entries[mid];
        let idx = self.alloc(point, ticket, axis);

        let (lower, upper) = entries.split_at_mut(mid);
        let left = self.build_balanced(lower, depth + 1);
        let right = self.build_balanced(&mut upper[1..], depth + 1);
        let node = &mut self.nodes[idx];
        node.left = left;
        node.right = right;
        self.refresh_height(idx);
        Some(idx)
    }

    fn height_budget(&self, factor: f64) -> usize {
        ((self.len as f64 + 1.0).log2() * factor).ceil() as usize + 1
    }

    fn maybe_rebuild(&mut self) {
        let Some(factor) = self.config.rebuild_height_factor else {
            return;
        };
        let height = self.height_of(self.root);
        let budget = self.height_budget(factor);
        if height <= budget.max(self.rebuild_floor) {
            return;
        }
        self.rebuild();
        let rebuilt = self.height_of(self.root);
        // Heavy duplication can keep a balanced tree over budget; do not rebuild
        // again on every mutation in that case.
        self.rebuild_floor = if rebuilt > budget { rebuilt } else { 0 };
        info!(
            size = self.len,
            from_height = height,
            to_height = rebuilt,
            "rebuilt spatial index"
        );
    }
}
