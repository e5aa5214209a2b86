//! Neighbor collections filled by the spatial index queries.
//!
//! Agent neighbors are bounded to `capacity` entries; once full, the search
//! range shrinks to the farthest kept neighbor so the tree query can prune.
//! Obstacle neighbors are unbounded. Both are handed out nearest first.

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

/// Bounded set of the nearest agents seen so far, keyed by squared distance.
pub(crate) struct AgentNeighborSet {
    capacity: usize,
    queue: PriorityQueue<usize, OrderedFloat<f64>>,
}

impl AgentNeighborSet {
    pub(crate) fn new(capacity: usize) -> Self {
        AgentNeighborSet {
            capacity,
            queue: PriorityQueue::with_capacity(capacity),
        }
    }

    /// Offers agent `id` at squared distance `dist_sq`. Candidates at or beyond
    /// `range_sq` are rejected; when the set becomes full `range_sq` is lowered
    /// to the farthest kept distance.
    pub(crate) fn insert(&mut self, id: usize, dist_sq: f64, range_sq: &mut f64) {
        if self.capacity == 0 || dist_sq >= *range_sq {
            return;
        }

        if self.queue.len() == self.capacity {
            self.queue.pop();
        }
        self.queue.push(id, OrderedFloat(dist_sq));

        if self.queue.len() == self.capacity {
            if let Some((_, farthest)) = self.queue.peek() {
                *range_sq = farthest.into_inner();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Consumes the set, returning `(dist_sq, id)` pairs nearest first.
    pub(crate) fn into_sorted(mut self) -> Vec<(f64, usize)> {
        let mut sorted = Vec::with_capacity(self.queue.len());
        while let Some((id, dist_sq)) = self.queue.pop() {
            sorted.push((dist_sq.into_inner(), id));
        }
        sorted.reverse();
        sorted
    }
}

/// Inserts `(dist_sq, id)` into `list`, keeping it sorted ascending by
/// distance. Equal distances keep insertion order.
pub(crate) fn insert_sorted(list: &mut Vec<(f64, usize)>, dist_sq: f64, id: usize) {
    let position = list.partition_point(|&(existing, _)| existing <= dist_sq);
    list.insert(position, (dist_sq, id));
}
