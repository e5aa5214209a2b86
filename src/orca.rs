//! # ORCA - Optimal Reciprocal Collision Avoidance
//!
//! Builds the half-plane constraints ("ORCA lines") an agent must respect in
//! velocity space, following "Reciprocal n-body Collision Avoidance" by
//! van den Berg et al. (ISRR 2011).
//!
//! ## Obstacle lines
//!
//! Obstacles do not move, so the agent takes full responsibility. For every
//! neighboring edge (nearest first):
//!
//! 1. Skip the edge if earlier lines already cover its velocity obstacle.
//! 2. If the agent already overlaps a vertex or the edge, emit a line
//!    through the origin that pushes it out.
//! 3. Otherwise build the truncated velocity obstacle: two legs tangent to
//!    the endpoint disks plus a cutoff line scaled by `1 / time_horizon_obst`.
//!    Obliquely viewed edges collapse to a single vertex; non-convex
//!    vertices extend the cutoff line instead of producing a leg; legs that
//!    would point into the neighboring edge are replaced by that edge
//!    ("foreign" legs) and then never produce a line.
//! 4. Project the current velocity onto the nearest boundary piece and emit
//!    the line through that projection.
//!
//! ## Agent lines
//!
//! Each agent takes half the responsibility: the line passes through
//! `velocity + u / 2`, where `u` is the smallest change of relative velocity
//! that leaves the truncated velocity obstacle. Overlapping agents use a
//! cutoff of one time step instead of the time horizon.

use crate::agent::Agent;
use crate::obstacle::ObstacleSet;
use crate::structs::{det, sqr, Line, Vector2D};
use crate::RVO_EPSILON;

/// Direction of the left tangent from the origin to the disk of `radius`
/// around `relative_position`.
fn left_leg(relative_position: Vector2D, radius: f64) -> Vector2D {
    let dist_sq = relative_position.abs_sq();
    let leg = (dist_sq - sqr(radius)).sqrt();
    Vector2D::new(
        relative_position.x * leg - relative_position.y * radius,
        relative_position.x * radius + relative_position.y * leg,
    ) * (1.0 / dist_sq)
}

/// Direction of the right tangent from the origin to the disk of `radius`
/// around `relative_position`.
fn right_leg(relative_position: Vector2D, radius: f64) -> Vector2D {
    let dist_sq = relative_position.abs_sq();
    let leg = (dist_sq - sqr(radius)).sqrt();
    Vector2D::new(
        relative_position.x * leg + relative_position.y * radius,
        -relative_position.x * radius + relative_position.y * leg,
    ) * (1.0 / dist_sq)
}

/// Builds the obstacle lines for `agent` from its obstacle neighbors,
/// given as `(dist_sq, vertex id)` pairs nearest first.
pub(crate) fn compute_obstacle_lines(
    agent: &Agent,
    obstacles: &ObstacleSet,
    neighbors: &[(f64, usize)],
) -> Vec<Line> {
    let inv_time_horizon_obst = 1.0 / agent.time_horizon_obst;
    let mut lines = Vec::with_capacity(neighbors.len());

    for &(_, vertex) in neighbors {
        if let Some(line) =
            compute_orca_line_for_obstacle(agent, obstacles, vertex, &lines, inv_time_horizon_obst)
        {
            lines.push(line);
        }
    }

    lines
}

fn compute_orca_line_for_obstacle(
    agent: &Agent,
    obstacles: &ObstacleSet,
    vertex: usize,
    existing: &[Line],
    inv_time_horizon_obst: f64,
) -> Option<Line> {
    let mut obstacle1 = &obstacles[vertex];
    let mut obstacle2 = &obstacles[obstacle1.next];

    let relative_position1 = obstacle1.point - agent.position;
    let relative_position2 = obstacle2.point - agent.position;

    // Already covered by an earlier obstacle line
    let scaled_radius = inv_time_horizon_obst * agent.radius;
    let covered = existing.iter().any(|line| {
        det(relative_position1 * inv_time_horizon_obst - line.point, line.direction) - scaled_radius
            >= -RVO_EPSILON
            && det(relative_position2 * inv_time_horizon_obst - line.point, line.direction)
                - scaled_radius
                >= -RVO_EPSILON
    });
    if covered {
        return None;
    }

    let dist_sq1 = relative_position1.abs_sq();
    let dist_sq2 = relative_position2.abs_sq();
    let radius_sq = sqr(agent.radius);

    let obstacle_vector = obstacle2.point - obstacle1.point;
    let s = (-relative_position1).dot(&obstacle_vector) / obstacle_vector.abs_sq();
    let dist_sq_line = (-relative_position1 - obstacle_vector * s).abs_sq();

    // Already colliding: push straight out
    if s < 0.0 && dist_sq1 <= radius_sq {
        // Left vertex, ignored when non-convex
        return obstacle1
            .is_convex
            .then(|| Line::new(Vector2D::ZERO, relative_position1.perpendicular().normalize()));
    }
    if s > 1.0 && dist_sq2 <= radius_sq {
        // Right vertex, ignored when non-convex or handled by the next edge
        let handled_here = obstacle2.is_convex && det(relative_position2, obstacle2.unit_dir) >= 0.0;
        return handled_here
            .then(|| Line::new(Vector2D::ZERO, relative_position2.perpendicular().normalize()));
    }
    if (0.0..1.0).contains(&s) && dist_sq_line <= radius_sq {
        return Some(Line::new(Vector2D::ZERO, -obstacle1.unit_dir));
    }

    // No collision: compute the legs
    let mut left_leg_direction;
    let mut right_leg_direction;

    if s < 0.0 && dist_sq_line <= radius_sq {
        // Viewed obliquely, the left vertex defines the velocity obstacle
        if !obstacle1.is_convex {
            return None;
        }
        obstacle2 = obstacle1;
        left_leg_direction = left_leg(relative_position1, agent.radius);
        right_leg_direction = right_leg(relative_position1, agent.radius);
    } else if s > 1.0 && dist_sq_line <= radius_sq {
        // Viewed obliquely, the right vertex defines the velocity obstacle
        if !obstacle2.is_convex {
            return None;
        }
        obstacle1 = obstacle2;
        left_leg_direction = left_leg(relative_position2, agent.radius);
        right_leg_direction = right_leg(relative_position2, agent.radius);
    } else {
        left_leg_direction = if obstacle1.is_convex {
            left_leg(relative_position1, agent.radius)
        } else {
            // Extends the cutoff line
            -obstacle1.unit_dir
        };
        right_leg_direction = if obstacle2.is_convex {
            right_leg(relative_position2, agent.radius)
        } else {
            obstacle1.unit_dir
        };
    }

    // A leg at a convex vertex never points into the neighboring edge
    let left_neighbor = &obstacles[obstacle1.previous];
    let mut is_left_leg_foreign = false;
    let mut is_right_leg_foreign = false;

    if obstacle1.is_convex && det(left_leg_direction, -left_neighbor.unit_dir) >= 0.0 {
        left_leg_direction = -left_neighbor.unit_dir;
        is_left_leg_foreign = true;
    }
    if obstacle2.is_convex && det(right_leg_direction, obstacle2.unit_dir) <= 0.0 {
        right_leg_direction = obstacle2.unit_dir;
        is_right_leg_foreign = true;
    }

    let left_cutoff = (obstacle1.point - agent.position) * inv_time_horizon_obst;
    let right_cutoff = (obstacle2.point - agent.position) * inv_time_horizon_obst;
    let cutoff_vector = right_cutoff - left_cutoff;
    let single_vertex = obstacle1.id == obstacle2.id;
    let velocity = agent.velocity;

    // Project the current velocity onto the cutoff circles
    let t = if single_vertex {
        0.5
    } else {
        (velocity - left_cutoff).dot(&cutoff_vector) / cutoff_vector.abs_sq()
    };
    let t_left = (velocity - left_cutoff).dot(&left_leg_direction);
    let t_right = (velocity - right_cutoff).dot(&right_leg_direction);

    if (t < 0.0 && t_left < 0.0) || (single_vertex && t_left < 0.0 && t_right < 0.0) {
        let unit_w = (velocity - left_cutoff).normalize();
        return Some(Line::new(
            left_cutoff + unit_w * scaled_radius,
            Vector2D::new(unit_w.y, -unit_w.x),
        ));
    }
    if t > 1.0 && t_right < 0.0 {
        let unit_w = (velocity - right_cutoff).normalize();
        return Some(Line::new(
            right_cutoff + unit_w * scaled_radius,
            Vector2D::new(unit_w.y, -unit_w.x),
        ));
    }

    // Otherwise project onto the nearest of cutoff line, left leg, right leg
    let dist_sq_cutoff = if t < 0.0 || t > 1.0 || single_vertex {
        f64::INFINITY
    } else {
        (velocity - (left_cutoff + cutoff_vector * t)).abs_sq()
    };
    let dist_sq_left = if t_left < 0.0 {
        f64::INFINITY
    } else {
        (velocity - (left_cutoff + left_leg_direction * t_left)).abs_sq()
    };
    let dist_sq_right = if t_right < 0.0 {
        f64::INFINITY
    } else {
        (velocity - (right_cutoff + right_leg_direction * t_right)).abs_sq()
    };

    let (direction, anchor) = if dist_sq_cutoff <= dist_sq_left && dist_sq_cutoff <= dist_sq_right {
        (-obstacle1.unit_dir, left_cutoff)
    } else if dist_sq_left <= dist_sq_right {
        if is_left_leg_foreign {
            return None;
        }
        (left_leg_direction, left_cutoff)
    } else {
        if is_right_leg_foreign {
            return None;
        }
        (-right_leg_direction, right_cutoff)
    };

    Some(Line::new(
        anchor + direction.perpendicular() * scaled_radius,
        direction,
    ))
}

/// Builds the reciprocal line `agent` must respect to avoid `other`.
/// `time_step` sets the cutoff when the two already overlap.
pub(crate) fn compute_orca_line_for_agent(agent: &Agent, other: &Agent, time_step: f64) -> Line {
    let relative_position = other.position - agent.position;
    let relative_velocity = agent.velocity - other.velocity;
    let dist_sq = relative_position.abs_sq();
    let combined_radius = agent.radius + other.radius;
    let combined_radius_sq = sqr(combined_radius);

    let (direction, u) = if dist_sq > combined_radius_sq {
        let inv_time_horizon = 1.0 / agent.time_horizon;

        // Vector from cutoff center to relative velocity
        let w = relative_velocity - relative_position * inv_time_horizon;
        let w_length_sq = w.abs_sq();
        let dot_product1 = w.dot(&relative_position);

        if dot_product1 < 0.0 && sqr(dot_product1) > combined_radius_sq * w_length_sq {
            // Project on the cutoff circle
            let w_length = w_length_sq.sqrt();
            let unit_w = w * (1.0 / w_length);
            (
                Vector2D::new(unit_w.y, -unit_w.x),
                unit_w * (combined_radius * inv_time_horizon - w_length),
            )
        } else {
            // Project on the nearer leg
            let direction = if det(relative_position, w) > 0.0 {
                left_leg(relative_position, combined_radius)
            } else {
                -right_leg(relative_position, combined_radius)
            };
            let dot_product2 = relative_velocity.dot(&direction);
            (direction, direction * dot_product2 - relative_velocity)
        }
    } else {
        // Overlapping: cutoff circle of one time step
        let inv_time_step = 1.0 / time_step;
        let w = relative_velocity - relative_position * inv_time_step;
        let w_length = w.magnitude();
        let unit_w = w * (1.0 / w_length);
        (
            Vector2D::new(unit_w.y, -unit_w.x),
            unit_w * (combined_radius * inv_time_step - w_length),
        )
    };

    Line::new(agent.velocity + u * 0.5, direction)
}
