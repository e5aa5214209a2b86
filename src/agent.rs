//! # Agent
//!
//! Kinematic state of one disk-shaped agent plus its avoidance computation.
//!
//! A step is split in two so every agent plans against the same snapshot:
//!
//! 1. [`Agent::plan`] reads the world (spatial indices, other agents) and
//!    returns an [`AvoidancePlan`] without touching the agent.
//! 2. [`Agent::commit`] stores the plan, then [`Agent::update`] moves the
//!    agent with the planned velocity.

use tracing::trace;

use crate::agent_tree::AgentTree;
use crate::config::{require_finite, require_non_negative, require_positive, AgentDefaults};
use crate::error::Result;
use crate::linear_program::{
    solve_2d_linear_program, solve_3d_linear_program, LinearProgramOutcome, OptimalValue,
};
use crate::obstacle::ObstacleSet;
use crate::obstacle_tree::ObstacleTree;
use crate::orca::{compute_obstacle_lines, compute_orca_line_for_agent};
use crate::structs::{sqr, Line, Vector2D};

#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) id: usize,
    pub(crate) position: Vector2D,
    pub(crate) velocity: Vector2D,
    pub(crate) pref_velocity: Vector2D,
    pub(crate) radius: f64,
    pub(crate) max_speed: f64,
    pub(crate) neighbor_dist: f64,
    pub(crate) max_neighbors: usize,
    pub(crate) time_horizon: f64,
    pub(crate) time_horizon_obst: f64,
    agent_neighbors: Vec<(f64, usize)>,
    obstacle_neighbors: Vec<(f64, usize)>,
    orca_lines: Vec<Line>,
    new_velocity: Vector2D,
}

/// Read-only view of the world an agent plans against.
pub(crate) struct PlanningContext<'a> {
    pub agents: &'a [Agent],
    pub agent_tree: &'a AgentTree,
    pub obstacles: &'a ObstacleSet,
    pub obstacle_tree: &'a ObstacleTree,
    pub time_step: f64,
}

/// Everything one agent computed during the planning phase of a step.
#[derive(Debug, Clone)]
pub(crate) struct AvoidancePlan {
    agent_neighbors: Vec<(f64, usize)>,
    obstacle_neighbors: Vec<(f64, usize)>,
    orca_lines: Vec<Line>,
    new_velocity: Vector2D,
}

impl Agent {
    pub(crate) fn new(id: usize, position: Vector2D, defaults: &AgentDefaults) -> Self {
        Agent {
            id,
            position,
            velocity: defaults.velocity,
            pref_velocity: Vector2D::ZERO,
            radius: defaults.radius,
            max_speed: defaults.max_speed,
            neighbor_dist: defaults.neighbor_dist,
            max_neighbors: defaults.max_neighbors,
            time_horizon: defaults.time_horizon,
            time_horizon_obst: defaults.time_horizon_obst,
            agent_neighbors: Vec::new(),
            obstacle_neighbors: Vec::new(),
            orca_lines: Vec::new(),
            new_velocity: defaults.velocity,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> Vector2D {
        self.position
    }

    pub fn velocity(&self) -> Vector2D {
        self.velocity
    }

    pub fn pref_velocity(&self) -> Vector2D {
        self.pref_velocity
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn neighbor_dist(&self) -> f64 {
        self.neighbor_dist
    }

    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    pub fn time_horizon(&self) -> f64 {
        self.time_horizon
    }

    pub fn time_horizon_obst(&self) -> f64 {
        self.time_horizon_obst
    }

    /// Constraint lines of the last step, obstacle lines first.
    pub fn orca_lines(&self) -> &[Line] {
        &self.orca_lines
    }

    /// `(dist_sq, agent id)` pairs of the last step, nearest first.
    pub fn agent_neighbors(&self) -> &[(f64, usize)] {
        &self.agent_neighbors
    }

    /// `(dist_sq, obstacle vertex id)` pairs of the last step, nearest first.
    pub fn obstacle_neighbors(&self) -> &[(f64, usize)] {
        &self.obstacle_neighbors
    }

    pub fn set_pref_velocity(&mut self, pref_velocity: Vector2D) -> Result<()> {
        require_finite(pref_velocity, "preferred velocity must be finite")?;
        self.pref_velocity = pref_velocity;
        Ok(())
    }

    pub fn set_position(&mut self, position: Vector2D) -> Result<()> {
        require_finite(position, "agent position must be finite")?;
        self.position = position;
        Ok(())
    }

    pub fn set_velocity(&mut self, velocity: Vector2D) -> Result<()> {
        require_finite(velocity, "velocity must be finite")?;
        self.velocity = velocity;
        Ok(())
    }

    pub fn set_radius(&mut self, radius: f64) -> Result<()> {
        require_non_negative(radius, "radius must be non-negative and finite")?;
        self.radius = radius;
        Ok(())
    }

    pub fn set_max_speed(&mut self, max_speed: f64) -> Result<()> {
        require_non_negative(max_speed, "max_speed must be non-negative and finite")?;
        self.max_speed = max_speed;
        Ok(())
    }

    pub fn set_neighbor_dist(&mut self, neighbor_dist: f64) -> Result<()> {
        require_non_negative(neighbor_dist, "neighbor_dist must be non-negative and finite")?;
        self.neighbor_dist = neighbor_dist;
        Ok(())
    }

    pub fn set_max_neighbors(&mut self, max_neighbors: usize) {
        self.max_neighbors = max_neighbors;
    }

    pub fn set_time_horizon(&mut self, time_horizon: f64) -> Result<()> {
        require_positive(time_horizon, "time_horizon must be positive and finite")?;
        self.time_horizon = time_horizon;
        Ok(())
    }

    pub fn set_time_horizon_obst(&mut self, time_horizon_obst: f64) -> Result<()> {
        require_positive(
            time_horizon_obst,
            "time_horizon_obst must be positive and finite",
        )?;
        self.time_horizon_obst = time_horizon_obst;
        Ok(())
    }

    /// Computes this agent's neighbors, constraint lines and new velocity
    /// against `context`. Does not modify the agent.
    pub(crate) fn plan(&self, context: &PlanningContext<'_>) -> AvoidancePlan {
        let (obstacle_neighbors, agent_neighbors) = self.compute_neighbors(context);
        let (orca_lines, new_velocity) =
            self.compute_new_velocity(context, &obstacle_neighbors, &agent_neighbors);

        AvoidancePlan {
            agent_neighbors,
            obstacle_neighbors,
            orca_lines,
            new_velocity,
        }
    }

    fn compute_neighbors(
        &self,
        context: &PlanningContext<'_>,
    ) -> (Vec<(f64, usize)>, Vec<(f64, usize)>) {
        let mut obstacle_neighbors = Vec::new();
        let range_sq = sqr(self.time_horizon_obst * self.max_speed + self.radius);
        context.obstacle_tree.query_neighbors(
            context.obstacles,
            self.position,
            range_sq,
            &mut obstacle_neighbors,
        );

        let agent_neighbors = if self.max_neighbors > 0 {
            context.agent_tree.query(
                self.position,
                Some(self.id),
                sqr(self.neighbor_dist),
                self.max_neighbors,
            )
        } else {
            Vec::new()
        };

        (obstacle_neighbors, agent_neighbors)
    }

    fn compute_new_velocity(
        &self,
        context: &PlanningContext<'_>,
        obstacle_neighbors: &[(f64, usize)],
        agent_neighbors: &[(f64, usize)],
    ) -> (Vec<Line>, Vector2D) {
        // Step 1: obstacle constraints, nearest first
        let mut orca_lines = compute_obstacle_lines(self, context.obstacles, obstacle_neighbors);
        let before = orca_lines.len();
        orca_lines.retain(Line::is_finite);
        if orca_lines.len() < before {
            trace!(
                agent = self.id,
                dropped = before - orca_lines.len(),
                "dropped non-finite obstacle lines"
            );
        }
        let num_obst_lines = orca_lines.len();

        // Step 2: reciprocal constraints against neighboring agents
        for &(_, other) in agent_neighbors {
            let line = compute_orca_line_for_agent(self, &context.agents[other], context.time_step);
            if line.is_finite() {
                orca_lines.push(line);
            } else {
                trace!(agent = self.id, other, "dropped non-finite agent line");
            }
        }

        // Step 3: closest feasible velocity to the preferred one
        let new_velocity = match solve_2d_linear_program(
            &orca_lines,
            self.max_speed,
            OptimalValue::Point(self.pref_velocity),
        ) {
            LinearProgramOutcome::Feasible(velocity) => velocity,
            LinearProgramOutcome::Infeasible {
                failed_line,
                partial,
            } => {
                trace!(agent = self.id, failed_line, "constraints infeasible, relaxing");
                solve_3d_linear_program(
                    &orca_lines,
                    num_obst_lines,
                    failed_line,
                    self.max_speed,
                    partial,
                )
            }
        };

        (orca_lines, new_velocity)
    }

    /// Stores the result of [`plan`](Self::plan). Position and velocity are
    /// unchanged until [`update`](Self::update).
    pub(crate) fn commit(&mut self, plan: AvoidancePlan) {
        self.agent_neighbors = plan.agent_neighbors;
        self.obstacle_neighbors = plan.obstacle_neighbors;
        self.orca_lines = plan.orca_lines;
        self.new_velocity = plan.new_velocity;
    }

    pub(crate) fn update(&mut self, time_step: f64) {
        self.velocity = self.new_velocity;
        self.position += self.velocity * time_step;
    }
}
