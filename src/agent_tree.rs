//! # Agent k-d Tree
//!
//! Axis-aligned bounding-box tree over a snapshot of agent positions, rebuilt
//! from scratch every step. Nodes live in a flat array of `2n - 1` entries
//! (root at 0); a node's left child is the next slot and its right child
//! follows the whole left subtree.
//!
//! ## Build
//!
//! Each node covers a range of a permutation of agent ids. Ranges larger than
//! `max_leaf_size` are split at the midpoint of the longer bounding-box axis
//! with an in-place two-pointer partition. If every agent lands on the upper
//! side, one is moved across so both children are non-empty.
//!
//! ## Query
//!
//! Leaves test every agent they hold. Internal nodes visit the child whose box
//! is nearer first and only visit the other one if its box is still inside
//! the search range, which shrinks as the bounded neighbor set fills.

use crate::neighbors::AgentNeighborSet;
use crate::structs::{sqr, Vector2D};

#[derive(Debug, Clone, Copy, Default)]
struct AgentTreeNode {
    begin: usize,
    end: usize,
    left: usize,
    right: usize,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl AgentTreeNode {
    /// Squared distance from `point` to this node's bounding box.
    fn dist_sq_to(&self, point: Vector2D) -> f64 {
        sqr((self.min_x - point.x).max(0.0))
            + sqr((point.x - self.max_x).max(0.0))
            + sqr((self.min_y - point.y).max(0.0))
            + sqr((point.y - self.max_y).max(0.0))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AgentTree {
    max_leaf_size: usize,
    positions: Vec<Vector2D>,
    agent_ids: Vec<usize>,
    nodes: Vec<AgentTreeNode>,
}

impl AgentTree {
    pub(crate) fn new(max_leaf_size: usize) -> Self {
        AgentTree {
            max_leaf_size: max_leaf_size.max(1),
            positions: Vec::new(),
            agent_ids: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Rebuilds the tree over `positions`, indexed by agent id.
    pub(crate) fn build<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = Vector2D>,
    {
        self.positions.clear();
        self.positions.extend(positions);

        let count = self.positions.len();
        self.agent_ids.clear();
        self.agent_ids.extend(0..count);

        self.nodes.clear();
        if count == 0 {
            return;
        }
        self.nodes.resize(2 * count - 1, AgentTreeNode::default());
        self.build_recursive(0, count, 0);
    }

    fn build_recursive(&mut self, begin: usize, end: usize, node: usize) {
        let first = self.positions[self.agent_ids[begin]];
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for &id in &self.agent_ids[begin + 1..end] {
            let p = self.positions[id];
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        self.nodes[node] = AgentTreeNode {
            begin,
            end,
            left: 0,
            right: 0,
            min_x,
            max_x,
            min_y,
            max_y,
        };

        if end - begin <= self.max_leaf_size {
            return;
        }

        let is_vertical = max_x - min_x > max_y - min_y;
        let split_value = if is_vertical {
            0.5 * (max_x + min_x)
        } else {
            0.5 * (max_y + min_y)
        };

        let mut left = partition(
            &mut self.agent_ids[begin..end],
            &self.positions,
            is_vertical,
            split_value,
        ) + begin;

        if left == begin {
            left += 1;
        }

        let left_size = left - begin;
        let left_node = node + 1;
        let right_node = node + 2 * left_size;
        self.nodes[node].left = left_node;
        self.nodes[node].right = right_node;

        self.build_recursive(begin, left, left_node);
        self.build_recursive(left, end, right_node);
    }

    /// Returns up to `max_results` agents strictly within `range_sq` of
    /// `point`, nearest first, as `(dist_sq, id)` pairs. `exclude` is skipped.
    pub(crate) fn query(
        &self,
        point: Vector2D,
        exclude: Option<usize>,
        range_sq: f64,
        max_results: usize,
    ) -> Vec<(f64, usize)> {
        let mut neighbors = AgentNeighborSet::new(max_results);
        if !self.nodes.is_empty() && max_results > 0 {
            let mut range_sq = range_sq;
            self.query_recursive(point, exclude, &mut neighbors, &mut range_sq, 0);
        }
        neighbors.into_sorted()
    }

    fn query_recursive(
        &self,
        point: Vector2D,
        exclude: Option<usize>,
        neighbors: &mut AgentNeighborSet,
        range_sq: &mut f64,
        node: usize,
    ) {
        let current = &self.nodes[node];

        if current.end - current.begin <= self.max_leaf_size {
            for &id in &self.agent_ids[current.begin..current.end] {
                if exclude == Some(id) {
                    continue;
                }
                let dist_sq = (point - self.positions[id]).abs_sq();
                neighbors.insert(id, dist_sq, range_sq);
            }
            return;
        }

        let dist_sq_left = self.nodes[current.left].dist_sq_to(point);
        let dist_sq_right = self.nodes[current.right].dist_sq_to(point);

        let (near, dist_sq_near, far, dist_sq_far) = if dist_sq_left < dist_sq_right {
            (current.left, dist_sq_left, current.right, dist_sq_right)
        } else {
            (current.right, dist_sq_right, current.left, dist_sq_left)
        };

        if dist_sq_near < *range_sq {
            self.query_recursive(point, exclude, neighbors, range_sq, near);

            if dist_sq_far < *range_sq {
                self.query_recursive(point, exclude, neighbors, range_sq, far);
            }
        }
    }

    #[cfg(test)]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Two-pointer partition of `ids` into coordinates below `split_value`
/// followed by the rest. Returns the size of the lower part.
fn partition(ids: &mut [usize], positions: &[Vector2D], is_vertical: bool, split_value: f64) -> usize {
    let coord = |id: usize| {
        if is_vertical {
            positions[id].x
        } else {
            positions[id].y
        }
    };

    let mut left = 0;
    let mut right = ids.len();

    while left < right {
        while left < right && coord(ids[left]) < split_value {
            left += 1;
        }
        while right > left && coord(ids[right - 1]) >= split_value {
            right -= 1;
        }
        if left < right {
            ids.swap(left, right - 1);
            left += 1;
            right -= 1;
        }
    }

    left
}
