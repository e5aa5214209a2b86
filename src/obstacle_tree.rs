//! # Obstacle BSP Tree
//!
//! Binary space partition over obstacle edges. Every node holds one edge;
//! the line through that edge separates its left and right subtrees. Edges
//! straddling a splitting line are cut in two during construction, which
//! inserts new vertices into the obstacle rings.
//!
//! The split edge at each level is the one minimizing
//! `(max(left, right), min(left, right))` lexicographically, where a
//! straddling edge counts on both sides.
//!
//! ## Queries
//!
//! - [`ObstacleTree::query_neighbors`]: all edges within a range whose
//!   outer side faces the query point, nearest first.
//! - [`ObstacleTree::query_visibility`]: whether a segment keeps `radius`
//!   clearance from every edge.

use crate::neighbors::insert_sorted;
use crate::obstacle::ObstacleSet;
use crate::structs::{det, dist_sq_point_line_segment, left_of, sqr, Vector2D};
use crate::RVO_EPSILON;

#[derive(Debug, Clone, Copy)]
struct ObstacleTreeNode {
    /// Vertex owning the splitting edge.
    vertex: usize,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Left,
    Right,
    Both,
}

/// Classifies edge `j1 -> j2` against the line through `i1 -> i2`. Also
/// returns how far `j1` lies to the left of that line.
fn classify(i1: Vector2D, i2: Vector2D, j1: Vector2D, j2: Vector2D) -> (Side, f64) {
    let j1_left_of_i = left_of(i1, i2, j1);
    let j2_left_of_i = left_of(i1, i2, j2);

    let side = if j1_left_of_i >= -RVO_EPSILON && j2_left_of_i >= -RVO_EPSILON {
        Side::Left
    } else if j1_left_of_i <= RVO_EPSILON && j2_left_of_i <= RVO_EPSILON {
        Side::Right
    } else {
        Side::Both
    };
    (side, j1_left_of_i)
}

fn balance(left: usize, right: usize) -> (usize, usize) {
    (left.max(right), left.min(right))
}

fn edge_points(obstacles: &ObstacleSet, vertex: usize) -> (Vector2D, Vector2D) {
    let v1 = &obstacles[vertex];
    (v1.point, obstacles[v1.next].point)
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ObstacleTree {
    nodes: Vec<ObstacleTreeNode>,
    root: Option<usize>,
}

impl ObstacleTree {
    /// Builds the tree over every edge of `obstacles`, starting from the
    /// registered rings (split vertices from an earlier build are dropped).
    pub(crate) fn build(obstacles: &mut ObstacleSet) -> Self {
        obstacles.discard_splits();

        let mut tree = ObstacleTree::default();
        let edges: Vec<usize> = (0..obstacles.len()).collect();
        tree.root = tree.build_recursive(obstacles, edges);
        tree
    }

    fn build_recursive(&mut self, obstacles: &mut ObstacleSet, edges: Vec<usize>) -> Option<usize> {
        if edges.is_empty() {
            return None;
        }

        let (optimal_split, left_size, right_size) = select_split(obstacles, &edges);
        let split_vertex = edges[optimal_split];
        let (i1, i2) = edge_points(obstacles, split_vertex);

        let mut left_edges = Vec::with_capacity(left_size);
        let mut right_edges = Vec::with_capacity(right_size);

        for (j, &edge) in edges.iter().enumerate() {
            if j == optimal_split {
                continue;
            }

            let (j1, j2) = edge_points(obstacles, edge);
            match classify(i1, i2, j1, j2) {
                (Side::Left, _) => left_edges.push(edge),
                (Side::Right, _) => right_edges.push(edge),
                (Side::Both, j1_left_of_i) => {
                    let t = det(i2 - i1, j1 - i1) / det(i2 - i1, j1 - j2);
                    let split_point = j1 + (j2 - j1) * t;
                    let new_vertex = obstacles.split_edge(edge, split_point);

                    if j1_left_of_i > 0.0 {
                        left_edges.push(edge);
                        right_edges.push(new_vertex);
                    } else {
                        right_edges.push(edge);
                        left_edges.push(new_vertex);
                    }
                }
            }
        }

        let node = self.nodes.len();
        self.nodes.push(ObstacleTreeNode {
            vertex: split_vertex,
            left: None,
            right: None,
        });

        let left = self.build_recursive(obstacles, left_edges);
        let right = self.build_recursive(obstacles, right_edges);
        self.nodes[node].left = left;
        self.nodes[node].right = right;

        Some(node)
    }

    /// Number of nodes, equal to the number of edges after splitting.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Collects edges within `range_sq` of `position` that face it from
    /// outside, as `(dist_sq, vertex id)` pairs nearest first.
    pub(crate) fn query_neighbors(
        &self,
        obstacles: &ObstacleSet,
        position: Vector2D,
        range_sq: f64,
        neighbors: &mut Vec<(f64, usize)>,
    ) {
        self.query_recursive(obstacles, position, range_sq, self.root, neighbors);
    }

    fn query_recursive(
        &self,
        obstacles: &ObstacleSet,
        position: Vector2D,
        range_sq: f64,
        node: Option<usize>,
        neighbors: &mut Vec<(f64, usize)>,
    ) {
        let Some(index) = node else {
            return;
        };
        let node = &self.nodes[index];
        let (p1, p2) = edge_points(obstacles, node.vertex);

        let agent_left_of_line = left_of(p1, p2, position);
        let (near, far) = if agent_left_of_line >= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.query_recursive(obstacles, position, range_sq, near, neighbors);

        let dist_sq_line = sqr(agent_left_of_line) / (p2 - p1).abs_sq();
        if dist_sq_line < range_sq {
            if agent_left_of_line < 0.0 {
                // Only edges seen from their outer side
                let dist_sq = dist_sq_point_line_segment(p1, p2, position);
                if dist_sq < range_sq {
                    insert_sorted(neighbors, dist_sq, node.vertex);
                }
            }

            self.query_recursive(obstacles, position, range_sq, far, neighbors);
        }
    }

    /// Whether `q1` and `q2` can see each other with `radius` clearance.
    /// Symmetric in `q1` and `q2`.
    pub(crate) fn query_visibility(
        &self,
        obstacles: &ObstacleSet,
        q1: Vector2D,
        q2: Vector2D,
        radius: f64,
    ) -> bool {
        self.visibility_recursive(obstacles, q1, q2, radius, self.root)
            && self.visibility_recursive(obstacles, q2, q1, radius, self.root)
    }

    fn visibility_recursive(
        &self,
        obstacles: &ObstacleSet,
        q1: Vector2D,
        q2: Vector2D,
        radius: f64,
        node: Option<usize>,
    ) -> bool {
        let Some(index) = node else {
            return true;
        };
        let node = &self.nodes[index];
        let (p1, p2) = edge_points(obstacles, node.vertex);

        let q1_left_of_i = left_of(p1, p2, q1);
        let q2_left_of_i = left_of(p1, p2, q2);
        let inv_length_i = 1.0 / (p2 - p1).abs_sq();
        let radius_sq = sqr(radius);

        let clear_of_line = || {
            sqr(q1_left_of_i) * inv_length_i >= radius_sq
                && sqr(q2_left_of_i) * inv_length_i >= radius_sq
        };

        if q1_left_of_i >= 0.0 && q2_left_of_i >= 0.0 {
            self.visibility_recursive(obstacles, q1, q2, radius, node.left)
                && (clear_of_line()
                    || self.visibility_recursive(obstacles, q1, q2, radius, node.right))
        } else if q1_left_of_i <= 0.0 && q2_left_of_i <= 0.0 {
            self.visibility_recursive(obstacles, q1, q2, radius, node.right)
                && (clear_of_line()
                    || self.visibility_recursive(obstacles, q1, q2, radius, node.left))
        } else if q1_left_of_i >= 0.0 && q2_left_of_i <= 0.0 {
            // Looking through the edge from its inner side
            self.visibility_recursive(obstacles, q1, q2, radius, node.left)
                && self.visibility_recursive(obstacles, q1, q2, radius, node.right)
        } else {
            let point1_left_of_q = left_of(q1, q2, p1);
            let point2_left_of_q = left_of(q1, q2, p2);
            let inv_length_q = 1.0 / (q2 - q1).abs_sq();

            point1_left_of_q * point2_left_of_q >= 0.0
                && sqr(point1_left_of_q) * inv_length_q > radius_sq
                && sqr(point2_left_of_q) * inv_length_q > radius_sq
                && self.visibility_recursive(obstacles, q1, q2, radius, node.left)
                && self.visibility_recursive(obstacles, q1, q2, radius, node.right)
        }
    }
}

/// Picks the edge whose line splits `edges` most evenly. Returns its index
/// in `edges` and the resulting left and right sizes.
fn select_split(obstacles: &ObstacleSet, edges: &[usize]) -> (usize, usize, usize) {
    let mut optimal_split = 0;
    let mut min_left = edges.len();
    let mut min_right = edges.len();

    for (i, &edge_i) in edges.iter().enumerate() {
        let (i1, i2) = edge_points(obstacles, edge_i);
        let mut left_size = 0;
        let mut right_size = 0;

        for (j, &edge_j) in edges.iter().enumerate() {
            if i == j {
                continue;
            }

            let (j1, j2) = edge_points(obstacles, edge_j);
            match classify(i1, i2, j1, j2).0 {
                Side::Left => left_size += 1,
                Side::Right => right_size += 1,
                Side::Both => {
                    left_size += 1;
                    right_size += 1;
                }
            }

            if balance(left_size, right_size) >= balance(min_left, min_right) {
                break;
            }
        }

        if balance(left_size, right_size) < balance(min_left, min_right) {
            min_left = left_size;
            min_right = right_size;
            optimal_split = i;
        }
    }

    (optimal_split, min_left, min_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Vec<Vector2D> {
        vec![
            Vector2D::new(x, y),
            Vector2D::new(x + size, y),
            Vector2D::new(x + size, y + size),
            Vector2D::new(x, y + size),
        ]
    }

    fn wall() -> Vec<Vector2D> {
        vec![Vector2D::new(-2.0, 0.0), Vector2D::new(2.0, 0.0)]
    }

    fn scene() -> ObstacleSet {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square(0.0, 0.0, 2.0));
        set.add_polygon(&[
            Vector2D::new(4.0, 4.0),
            Vector2D::new(6.0, 4.0),
            Vector2D::new(5.0, 6.0),
        ]);
        set.add_polygon(&[Vector2D::new(-3.0, 3.0), Vector2D::new(-1.0, 5.0)]);
        set.add_polygon(&[
            Vector2D::new(-6.0, -6.0),
            Vector2D::new(-2.0, -6.0),
            Vector2D::new(-2.0, -5.0),
            Vector2D::new(-5.0, -5.0),
            Vector2D::new(-5.0, -2.0),
            Vector2D::new(-6.0, -2.0),
        ]);
        set
    }

    fn query_points() -> Vec<Vector2D> {
        let mut points = Vec::new();
        for i in 0..12 {
            for j in 0..12 {
                points.push(Vector2D::new(
                    -7.63 + 1.13 * i as f64,
                    -7.41 + 1.17 * j as f64,
                ));
            }
        }
        points
    }

    fn brute_force_neighbors(set: &ObstacleSet, position: Vector2D, range_sq: f64) -> Vec<usize> {
        let mut ids: Vec<usize> = set
            .vertices()
            .iter()
            .filter(|v| {
                let p2 = set[v.next()].point();
                left_of(v.point(), p2, position) < 0.0
                    && dist_sq_point_line_segment(v.point(), p2, position) < range_sq
            })
            .map(|v| v.id())
            .collect();
        ids.sort_unstable();
        ids
    }

    // ==================== Build Tests ====================

    #[test]
    fn test_empty_tree() {
        let mut set = ObstacleSet::new();
        let tree = ObstacleTree::build(&mut set);
        assert!(tree.is_empty());

        let mut neighbors = Vec::new();
        tree.query_neighbors(&set, Vector2D::ZERO, 100.0, &mut neighbors);
        assert!(neighbors.is_empty());
        assert!(tree.query_visibility(&set, Vector2D::ZERO, Vector2D::new(5.0, 5.0), 1.0));
    }

    #[test]
    fn test_build_covers_every_edge_once() {
        let mut set = scene();
        let tree = ObstacleTree::build(&mut set);

        assert_eq!(tree.len(), set.len(), "one node per edge after splitting");
        let mut vertices: Vec<usize> = tree.nodes.iter().map(|n| n.vertex).collect();
        vertices.sort_unstable();
        assert_eq!(vertices, (0..set.len()).collect::<Vec<_>>());

        for vertex in set.vertices() {
            assert_eq!(set[vertex.next()].previous(), vertex.id());
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut set = scene();
        let first = ObstacleTree::build(&mut set);
        let first_len = set.len();
        let first_splits = set.num_split_vertices();

        let mut first_results = Vec::new();
        for point in query_points() {
            let mut neighbors = Vec::new();
            first.query_neighbors(&set, point, 4.0, &mut neighbors);
            first_results.push(neighbors);
        }

        let second = ObstacleTree::build(&mut set);
        assert_eq!(set.len(), first_len);
        assert_eq!(set.num_split_vertices(), first_splits);

        for (point, expected) in query_points().into_iter().zip(first_results) {
            let mut neighbors = Vec::new();
            second.query_neighbors(&set, point, 4.0, &mut neighbors);
            assert_eq!(neighbors, expected, "results differ at {}", point);
        }
    }

    #[test]
    fn test_straddling_edge_is_split() {
        // Two crossing walls: whichever edge is chosen, the other wall
        // straddles its line
        let mut set = ObstacleSet::new();
        set.add_polygon(&wall());
        set.add_polygon(&[Vector2D::new(0.0, -2.0), Vector2D::new(0.0, 2.0)]);

        let tree = ObstacleTree::build(&mut set);
        assert_eq!(set.num_split_vertices(), 2);
        assert_eq!(tree.len(), 6);
        for vertex in &set.vertices()[4..] {
            assert!(vertex.is_convex());
            assert_eq!(vertex.point(), Vector2D::new(0.0, 0.0));
        }
        assert_eq!(set[2].next(), 4);
        assert_eq!(set[4].next(), 3);
    }

    // ==================== Neighbor Query Tests ====================

    #[test]
    fn test_query_neighbors_outer_side_only() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square(0.0, 0.0, 2.0));
        let tree = ObstacleTree::build(&mut set);

        let mut neighbors = Vec::new();
        tree.query_neighbors(&set, Vector2D::new(1.0, -1.0), 4.0, &mut neighbors);
        assert_eq!(neighbors, vec![(1.0, 0)]);
    }

    #[test]
    fn test_query_neighbors_sorted_by_distance() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square(0.0, 0.0, 2.0));
        set.add_polygon(&square(4.0, 0.0, 2.0));
        let tree = ObstacleTree::build(&mut set);

        // Between the squares, nearer the first one
        let mut neighbors = Vec::new();
        tree.query_neighbors(&set, Vector2D::new(2.5, 1.0), 9.0, &mut neighbors);
        assert_eq!(neighbors, vec![(0.25, 1), (2.25, 7)]);
    }

    #[test]
    fn test_query_neighbors_matches_brute_force() {
        let mut set = scene();
        let tree = ObstacleTree::build(&mut set);

        for point in query_points() {
            for range_sq in [1.0, 6.0, 30.0] {
                let mut neighbors = Vec::new();
                tree.query_neighbors(&set, point, range_sq, &mut neighbors);

                assert!(neighbors.windows(2).all(|w| w[0].0 <= w[1].0));
                let mut ids: Vec<usize> = neighbors.iter().map(|&(_, id)| id).collect();
                ids.sort_unstable();
                assert_eq!(
                    ids,
                    brute_force_neighbors(&set, point, range_sq),
                    "neighbors differ at {} with range {}",
                    point,
                    range_sq
                );
            }
        }
    }

    // ==================== Visibility Tests ====================

    #[test]
    fn test_wall_blocks_sight_line() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&wall());
        let tree = ObstacleTree::build(&mut set);

        let below = Vector2D::new(0.0, -3.0);
        let above = Vector2D::new(0.0, 3.0);
        assert!(!tree.query_visibility(&set, below, above, 0.5));
        assert!(!tree.query_visibility(&set, above, below, 0.5));
    }

    #[test]
    fn test_sight_line_past_wall_end() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&wall());
        let tree = ObstacleTree::build(&mut set);

        let q1 = Vector2D::new(5.0, -3.0);
        let q2 = Vector2D::new(5.0, 3.0);
        assert!(tree.query_visibility(&set, q1, q2, 0.5));

        // Passing 0.3 from the wall end does not leave 0.5 clearance
        let q1 = Vector2D::new(2.3, -3.0);
        let q2 = Vector2D::new(2.3, 3.0);
        assert!(!tree.query_visibility(&set, q1, q2, 0.5));
        assert!(tree.query_visibility(&set, q1, q2, 0.1));
    }

    #[test]
    fn test_sight_line_along_wall_side() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&wall());
        let tree = ObstacleTree::build(&mut set);

        assert!(tree.query_visibility(
            &set,
            Vector2D::new(-1.0, 1.0),
            Vector2D::new(1.0, 1.0),
            0.5
        ));
    }

    #[test]
    fn test_square_blocks_diagonal() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square(0.0, 0.0, 2.0));
        let tree = ObstacleTree::build(&mut set);

        assert!(!tree.query_visibility(
            &set,
            Vector2D::new(-1.0, -1.0),
            Vector2D::new(3.0, 3.0),
            0.1
        ));
        assert!(tree.query_visibility(
            &set,
            Vector2D::new(-1.0, -1.0),
            Vector2D::new(3.0, -1.0),
            0.1
        ));
    }

    #[test]
    fn test_visibility_is_symmetric() {
        let mut set = scene();
        let tree = ObstacleTree::build(&mut set);

        let points = query_points();
        for (a, b) in points.iter().zip(points.iter().rev()).take(72) {
            for radius in [0.0, 0.3, 1.0] {
                assert_eq!(
                    tree.query_visibility(&set, *a, *b, radius),
                    tree.query_visibility(&set, *b, *a, radius),
                    "asymmetric between {} and {}",
                    a,
                    b
                );
            }
        }
    }
}
