//! # Obstacle Rings
//!
//! Polygonal obstacles are stored as closed rings of directed edges in an
//! index-addressed arena. Each vertex owns the edge to its `next` vertex;
//! `previous` is the exact inverse of `next`.
//!
//! The only mutation after registration is [`ObstacleSet::split_edge`],
//! which the obstacle tree calls while it is being built. Registering a new
//! polygon discards those split vertices again, so a rebuild always starts
//! from the rings exactly as they were registered.

use std::ops::Index;

use crate::structs::{left_of, Vector2D};

/// One vertex of an obstacle ring, owning the edge to its `next` vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleVertex {
    pub(crate) point: Vector2D,
    pub(crate) unit_dir: Vector2D,
    pub(crate) is_convex: bool,
    pub(crate) previous: usize,
    pub(crate) next: usize,
    pub(crate) id: usize,
}

impl ObstacleVertex {
    pub fn point(&self) -> Vector2D {
        self.point
    }

    /// Unit direction of the edge from this vertex to `next`.
    pub fn unit_dir(&self) -> Vector2D {
        self.unit_dir
    }

    pub fn is_convex(&self) -> bool {
        self.is_convex
    }

    pub fn previous(&self) -> usize {
        self.previous
    }

    pub fn next(&self) -> usize {
        self.next
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObstacleSet {
    vertices: Vec<ObstacleVertex>,
    polygons: Vec<Vec<Vector2D>>,
    registered: usize,
}

impl ObstacleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closed polygon and returns the id of its first vertex, or
    /// `None` when fewer than two vertices are given.
    pub fn add_polygon(&mut self, polygon: &[Vector2D]) -> Option<usize> {
        if polygon.len() < 2 {
            return None;
        }

        self.discard_splits();

        let first = self.vertices.len();
        push_ring(&mut self.vertices, polygon);
        self.polygons.push(polygon.to_vec());
        self.registered = self.vertices.len();
        Some(first)
    }

    /// Inserts a new convex vertex at `point` on the edge owned by `edge`,
    /// splicing it between `edge` and its `next`. Returns the new vertex id.
    pub(crate) fn split_edge(&mut self, edge: usize, point: Vector2D) -> usize {
        let id = self.vertices.len();
        let next = self.vertices[edge].next;
        let unit_dir = self.vertices[edge].unit_dir;

        self.vertices.push(ObstacleVertex {
            point,
            unit_dir,
            is_convex: true,
            previous: edge,
            next,
            id,
        });
        self.vertices[edge].next = id;
        self.vertices[next].previous = id;
        id
    }

    /// Drops every vertex created by [`split_edge`](Self::split_edge) and
    /// restores the registered rings. Returns whether anything was dropped.
    pub(crate) fn discard_splits(&mut self) -> bool {
        if self.vertices.len() == self.registered {
            return false;
        }

        self.vertices.clear();
        for polygon in &self.polygons {
            push_ring(&mut self.vertices, polygon);
        }
        true
    }

    pub fn vertex(&self, id: usize) -> Option<&ObstacleVertex> {
        self.vertices.get(id)
    }

    pub fn vertices(&self) -> &[ObstacleVertex] {
        &self.vertices
    }

    /// Total vertex count, split vertices included.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn num_polygons(&self) -> usize {
        self.polygons.len()
    }

    /// Number of vertices created by splitting edges.
    pub fn num_split_vertices(&self) -> usize {
        self.vertices.len() - self.registered
    }
}

impl Index<usize> for ObstacleSet {
    type Output = ObstacleVertex;

    fn index(&self, id: usize) -> &ObstacleVertex {
        &self.vertices[id]
    }
}

fn push_ring(vertices: &mut Vec<ObstacleVertex>, polygon: &[Vector2D]) {
    let first = vertices.len();
    let n = polygon.len();

    for i in 0..n {
        let prev_index = if i == 0 { n - 1 } else { i - 1 };
        let next_index = if i == n - 1 { 0 } else { i + 1 };

        // A two-vertex obstacle is a thin wall, convex on both ends
        let is_convex = n == 2
            || left_of(polygon[prev_index], polygon[i], polygon[next_index]) >= 0.0;

        vertices.push(ObstacleVertex {
            point: polygon[i],
            unit_dir: (polygon[next_index] - polygon[i]).normalize(),
            is_convex,
            previous: first + prev_index,
            next: first + next_index,
            id: first + i,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Vector2D> {
        vec![
            Vector2D::new(0.0, 0.0),
            Vector2D::new(2.0, 0.0),
            Vector2D::new(2.0, 2.0),
            Vector2D::new(0.0, 2.0),
        ]
    }

    fn assert_rings_closed(set: &ObstacleSet) {
        for vertex in set.vertices() {
            assert_eq!(set[vertex.next].previous, vertex.id);
            assert_eq!(set[vertex.previous].next, vertex.id);

            let mut current = vertex.next;
            let mut hops = 0;
            while current != vertex.id {
                current = set[current].next;
                hops += 1;
                assert!(hops <= set.len(), "ring starting at {} is not closed", vertex.id);
            }
        }
    }

    #[test]
    fn test_add_polygon_rejects_degenerate() {
        let mut set = ObstacleSet::new();
        assert_eq!(set.add_polygon(&[]), None);
        assert_eq!(set.add_polygon(&[Vector2D::new(1.0, 1.0)]), None);
        assert!(set.is_empty());
        assert_eq!(set.num_polygons(), 0);
    }

    #[test]
    fn test_add_polygon_returns_first_vertex_id() {
        let mut set = ObstacleSet::new();
        assert_eq!(set.add_polygon(&square()), Some(0));
        assert_eq!(
            set.add_polygon(&[Vector2D::new(5.0, 0.0), Vector2D::new(6.0, 0.0)]),
            Some(4)
        );
        assert_eq!(set.len(), 6);
        assert_eq!(set.num_polygons(), 2);
        assert_rings_closed(&set);
    }

    #[test]
    fn test_square_is_convex_with_unit_directions() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square());

        for vertex in set.vertices() {
            assert!(vertex.is_convex(), "vertex {} should be convex", vertex.id());
            assert_relative_eq!(vertex.unit_dir().magnitude(), 1.0, epsilon = 1e-12);
        }
        assert_eq!(set[0].unit_dir(), Vector2D::new(1.0, 0.0));
        assert_eq!(set[3].unit_dir(), Vector2D::new(0.0, -1.0));
    }

    #[test]
    fn test_concave_vertex_detected() {
        // Counter-clockwise L shape with a reflex corner at (1, 1)
        let mut set = ObstacleSet::new();
        set.add_polygon(&[
            Vector2D::new(0.0, 0.0),
            Vector2D::new(2.0, 0.0),
            Vector2D::new(2.0, 1.0),
            Vector2D::new(1.0, 1.0),
            Vector2D::new(1.0, 2.0),
            Vector2D::new(0.0, 2.0),
        ]);

        let concave: Vec<usize> = set
            .vertices()
            .iter()
            .filter(|v| !v.is_convex())
            .map(|v| v.id())
            .collect();
        assert_eq!(concave, vec![3]);
    }

    #[test]
    fn test_two_vertex_wall_is_convex_both_ends() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&[Vector2D::new(-1.0, 0.0), Vector2D::new(1.0, 0.0)]);

        assert!(set[0].is_convex() && set[1].is_convex());
        assert_eq!(set[0].next(), 1);
        assert_eq!(set[1].next(), 0);
        assert_eq!(set[0].unit_dir(), Vector2D::new(1.0, 0.0));
        assert_eq!(set[1].unit_dir(), Vector2D::new(-1.0, 0.0));
    }

    #[test]
    fn test_split_edge_splices_ring() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square());

        let id = set.split_edge(0, Vector2D::new(1.0, 0.0));
        assert_eq!(id, 4);
        assert_eq!(set[0].next(), 4);
        assert_eq!(set[4].next(), 1);
        assert_eq!(set[1].previous(), 4);
        assert!(set[4].is_convex());
        assert_eq!(set[4].unit_dir(), set[0].unit_dir());
        assert_eq!(set.num_split_vertices(), 1);
        assert_rings_closed(&set);
    }

    #[test]
    fn test_adding_polygon_discards_splits() {
        let mut set = ObstacleSet::new();
        set.add_polygon(&square());
        set.split_edge(0, Vector2D::new(1.0, 0.0));

        let first = set.add_polygon(&[Vector2D::new(5.0, 0.0), Vector2D::new(6.0, 0.0)]);
        assert_eq!(first, Some(4));
        assert_eq!(set.num_split_vertices(), 0);
        assert_eq!(set[0].next(), 1);
        assert_rings_closed(&set);
    }
}
