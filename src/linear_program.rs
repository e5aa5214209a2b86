//! # Incremental Linear Programming
//!
//! Picks a velocity inside a disk of radius `radius` that satisfies a list of
//! half-plane constraints ([`Line`]s), as close as possible to an optimization
//! target.
//!
//! - [`solve_2d_linear_program`]: incremental LP. Lines are processed in
//!   order; whenever the running optimum violates a line, the
//!   optimum is recomputed on that line (a 1D problem bounded by the disk and
//!   all earlier lines).
//! - [`solve_3d_linear_program`]: relaxation used when the 2D problem has no
//!   solution. Starting at the failing line, it minimizes the largest
//!   penetration into the remaining constraints while treating the first
//!   `num_obst_lines` lines as hard.

use crate::structs::{det, sqr, Line, Vector2D};
use crate::RVO_EPSILON;

/// What the solver optimizes for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimalValue {
    /// Closest feasible point to this velocity.
    Point(Vector2D),
    /// Feasible point furthest along this unit direction.
    Direction(Vector2D),
}

/// Result of [`solve_2d_linear_program`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearProgramOutcome {
    /// Every line is satisfied by the returned velocity.
    Feasible(Vector2D),
    /// Line `failed_line` could not be satisfied together with the lines
    /// before it. `partial` is the optimum over the lines before it.
    Infeasible { failed_line: usize, partial: Vector2D },
}

/// Solves the 1D problem on line `line_no`, bounded by the disk and every
/// earlier line. Returns `None` when the feasible interval is empty or the
/// result is not finite.
fn solve_along_line(
    lines: &[Line],
    line_no: usize,
    radius: f64,
    optimal: OptimalValue,
) -> Option<Vector2D> {
    let line = &lines[line_no];
    let dot_product = line.point.dot(&line.direction);
    let discriminant = sqr(dot_product) + sqr(radius) - line.point.abs_sq();

    if discriminant.is_nan() || discriminant < 0.0 {
        // Max speed circle fully invalidates this line
        return None;
    }

    let sqrt_discriminant = discriminant.sqrt();
    let mut t_left = -dot_product - sqrt_discriminant;
    let mut t_right = -dot_product + sqrt_discriminant;

    for other in &lines[..line_no] {
        let denominator = det(line.direction, other.direction);
        let numerator = det(other.direction, line.point - other.point);

        if denominator.abs() <= RVO_EPSILON {
            // (Almost) parallel: either fully inside or fully outside
            if numerator < 0.0 {
                return None;
            }
            continue;
        }

        let t = numerator / denominator;
        if denominator >= 0.0 {
            t_right = t_right.min(t);
        } else {
            t_left = t_left.max(t);
        }

        if t_left > t_right {
            return None;
        }
    }

    let t = match optimal {
        OptimalValue::Direction(direction) => {
            if direction.dot(&line.direction) > 0.0 {
                t_right
            } else {
                t_left
            }
        }
        OptimalValue::Point(velocity) => {
            let t = line.direction.dot(&(velocity - line.point));
            if t < t_left {
                t_left
            } else if t > t_right {
                t_right
            } else {
                t
            }
        }
    };

    let result = line.point + line.direction * t;
    result.is_finite().then_some(result)
}

/// Solves the 2D problem over `lines` inside the disk of radius `radius`.
pub fn solve_2d_linear_program(
    lines: &[Line],
    radius: f64,
    optimal: OptimalValue,
) -> LinearProgramOutcome {
    let mut result = match optimal {
        // Direction is unit length here
        OptimalValue::Direction(direction) => direction * radius,
        OptimalValue::Point(velocity) if velocity.abs_sq() > sqr(radius) => {
            velocity.normalize() * radius
        }
        OptimalValue::Point(velocity) => velocity,
    };

    for (i, line) in lines.iter().enumerate() {
        if line.violation(result) > 0.0 {
            match solve_along_line(lines, i, radius, optimal) {
                Some(velocity) => result = velocity,
                None => {
                    return LinearProgramOutcome::Infeasible {
                        failed_line: i,
                        partial: result,
                    }
                }
            }
        }
    }

    LinearProgramOutcome::Feasible(result)
}

/// Relaxes `lines[begin_line..]` when the 2D problem failed at `begin_line`,
/// starting from the partial optimum `result`. The first `num_obst_lines`
/// lines stay hard constraints.
pub fn solve_3d_linear_program(
    lines: &[Line],
    num_obst_lines: usize,
    begin_line: usize,
    radius: f64,
    mut result: Vector2D,
) -> Vector2D {
    let mut distance = 0.0;

    for i in begin_line..lines.len() {
        let line_i = &lines[i];
        if line_i.violation(result) <= distance {
            continue;
        }

        // Step 1: project every soft line before i onto line i
        let mut projected: Vec<Line> = lines[..num_obst_lines].to_vec();
        for line_j in lines.iter().take(i).skip(num_obst_lines) {
            let determinant = det(line_i.direction, line_j.direction);

            let point = if determinant.abs() <= RVO_EPSILON {
                if line_i.direction.dot(&line_j.direction) > 0.0 {
                    // Same direction: line j never binds tighter than line i
                    continue;
                }
                (line_i.point + line_j.point) * 0.5
            } else {
                line_i.point
                    + line_i.direction
                        * (det(line_j.direction, line_i.point - line_j.point) / determinant)
            };

            projected.push(Line::new(
                point,
                (line_j.direction - line_i.direction).normalize(),
            ));
        }

        // Step 2: push as far as possible into the feasible side of line i
        let direction = OptimalValue::Direction(line_i.direction.perpendicular());
        if let LinearProgramOutcome::Feasible(velocity) =
            solve_2d_linear_program(&projected, radius, direction)
        {
            result = velocity;
        }
        // Otherwise floating-point error; keep the previous estimate

        distance = line_i.violation(result);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Feasible where y >= value.
    fn at_least_y(value: f64) -> Line {
        Line::new(Vector2D::new(0.0, value), Vector2D::new(1.0, 0.0))
    }

    /// Feasible where y <= value.
    fn at_most_y(value: f64) -> Line {
        Line::new(Vector2D::new(0.0, value), Vector2D::new(-1.0, 0.0))
    }

    /// Feasible where x >= value.
    fn at_least_x(value: f64) -> Line {
        Line::new(Vector2D::new(value, 0.0), Vector2D::new(0.0, -1.0))
    }

    fn feasible(outcome: LinearProgramOutcome) -> Vector2D {
        match outcome {
            LinearProgramOutcome::Feasible(v) => v,
            other => panic!("expected a feasible outcome, got {:?}", other),
        }
    }

    // ==================== 2D Tests ====================

    #[test]
    fn test_no_lines_returns_preferred_inside_disk() {
        let pref = Vector2D::new(0.5, -0.5);
        let v = feasible(solve_2d_linear_program(&[], 2.0, OptimalValue::Point(pref)));
        assert_eq!(v, pref);
    }

    #[test]
    fn test_no_lines_clamps_to_disk() {
        let v = feasible(solve_2d_linear_program(
            &[],
            2.0,
            OptimalValue::Point(Vector2D::new(3.0, 4.0)),
        ));
        assert_relative_eq!(v.x, 1.2, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.6, epsilon = 1e-12);
    }

    #[test]
    fn test_single_violated_line_projects_onto_it() {
        let v = feasible(solve_2d_linear_program(
            &[at_least_y(1.0)],
            2.0,
            OptimalValue::Point(Vector2D::new(0.5, 0.0)),
        ));
        assert_relative_eq!(v.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_two_lines_meet_at_corner() {
        let lines = [at_least_y(1.0), at_least_x(1.0)];
        let v = feasible(solve_2d_linear_program(
            &lines,
            5.0,
            OptimalValue::Point(Vector2D::ZERO),
        ));
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
        for line in &lines {
            assert!(line.violation(v) <= 1e-12);
        }
    }

    #[test]
    fn test_parallel_lines_same_direction() {
        let v = feasible(solve_2d_linear_program(
            &[at_least_y(1.0), at_least_y(2.0)],
            5.0,
            OptimalValue::Point(Vector2D::ZERO),
        ));
        assert_relative_eq!(v.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_opposing_lines_report_failure_index() {
        let outcome = solve_2d_linear_program(
            &[at_least_y(1.0), at_most_y(-1.0)],
            5.0,
            OptimalValue::Point(Vector2D::ZERO),
        );
        match outcome {
            LinearProgramOutcome::Infeasible { failed_line, partial } => {
                assert_eq!(failed_line, 1);
                assert_relative_eq!(partial.y, 1.0, epsilon = 1e-12);
            }
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_line_outside_disk_is_infeasible() {
        let outcome = solve_2d_linear_program(
            &[at_least_y(3.0)],
            2.0,
            OptimalValue::Point(Vector2D::ZERO),
        );
        assert!(matches!(
            outcome,
            LinearProgramOutcome::Infeasible { failed_line: 0, .. }
        ));
    }

    #[test]
    fn test_non_finite_line_is_rejected() {
        let line = Line::new(Vector2D::new(f64::NAN, 0.0), Vector2D::new(1.0, 0.0));
        assert_eq!(
            solve_along_line(&[line], 0, 1.0, OptimalValue::Point(Vector2D::ZERO)),
            None
        );
    }

    #[test]
    fn test_direction_optimization_takes_extreme() {
        let line = at_least_y(0.0);
        let right = solve_along_line(
            &[line],
            0,
            2.0,
            OptimalValue::Direction(Vector2D::new(1.0, 0.0)),
        );
        let left = solve_along_line(
            &[line],
            0,
            2.0,
            OptimalValue::Direction(Vector2D::new(-1.0, 0.0)),
        );
        assert_eq!(right, Some(Vector2D::new(2.0, 0.0)));
        assert_eq!(left, Some(Vector2D::new(-2.0, 0.0)));
    }

    // ==================== 3D Tests ====================

    #[test]
    fn test_relaxation_pushes_toward_unreachable_line() {
        let lines = [at_least_y(3.0)];
        let v = solve_3d_linear_program(&lines, 0, 0, 2.0, Vector2D::ZERO);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_relaxation_splits_opposing_lines_evenly() {
        let lines = [at_least_y(1.0), at_most_y(-1.0)];
        let v = solve_3d_linear_program(&lines, 0, 1, 5.0, Vector2D::new(0.0, 1.0));

        // Both lines end up penetrated by the same amount
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-9);
        assert!(v.magnitude() <= 5.0 + 1e-9);
        assert_relative_eq!(lines[0].violation(v), lines[1].violation(v), epsilon = 1e-9);
    }

    #[test]
    fn test_relaxation_keeps_obstacle_lines_hard() {
        // Obstacle line x >= 1 must hold while the agent lines conflict
        let lines = [at_least_x(1.0), at_least_y(1.0), at_most_y(-1.0)];
        let partial = match solve_2d_linear_program(
            &lines,
            5.0,
            OptimalValue::Point(Vector2D::ZERO),
        ) {
            LinearProgramOutcome::Infeasible { failed_line, partial } => {
                assert_eq!(failed_line, 2);
                partial
            }
            other => panic!("expected infeasible, got {:?}", other),
        };

        let v = solve_3d_linear_program(&lines, 1, 2, 5.0, partial);
        assert!(lines[0].violation(v) <= 1e-9, "obstacle line violated: {}", v);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_relaxation_from_failed_obstacle_line() {
        // Conflicting hard lines keep the partial result
        let lines = [at_least_y(1.0), at_most_y(-1.0)];
        let v = solve_3d_linear_program(&lines, 2, 1, 5.0, Vector2D::new(0.0, 1.0));
        assert_eq!(v, Vector2D::new(0.0, 1.0));
    }

    #[test]
    fn test_relaxation_skips_soft_lines_behind_failed_obstacle_line() {
        let at_most_x = Line::new(Vector2D::new(-1.0, 0.0), Vector2D::new(0.0, 1.0));
        let lines = [at_least_x(1.0), at_most_x, at_least_y(0.0)];
        let partial = match solve_2d_linear_program(
            &lines,
            5.0,
            OptimalValue::Point(Vector2D::ZERO),
        ) {
            LinearProgramOutcome::Infeasible { failed_line, partial } => {
                assert_eq!(failed_line, 1);
                partial
            }
            other => panic!("expected infeasible, got {:?}", other),
        };

        let v = solve_3d_linear_program(&lines, 2, 1, 5.0, partial);
        assert!(v.is_finite());
        assert!(v.magnitude() <= 5.0 + 1e-9);
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-9);
    }
}
