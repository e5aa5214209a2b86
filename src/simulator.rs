//! # Simulator
//!
//! Owns the agents, their goals and the obstacles, and advances the world
//! in discrete steps.
//!
//! ## Step
//!
//! 1. Rebuild the agent tree from the current positions.
//! 2. Plan every agent against that snapshot (in parallel when
//!    [`SimulatorConfig::parallel`] is set).
//! 3. Commit and integrate the plans in agent id order.
//! 4. Advance the global time.
//!
//! Obstacles are registered with [`Simulator::add_obstacle`] and become
//! visible to agents once [`Simulator::process_obstacles`] has built the
//! obstacle tree.

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::agent::{Agent, AvoidancePlan, PlanningContext};
use crate::agent_tree::AgentTree;
use crate::config::{require_finite, validate_time_step, AgentDefaults, SimulatorConfig};
use crate::error::{Result, SimulatorError};
use crate::obstacle::{ObstacleSet, ObstacleVertex};
use crate::obstacle_tree::ObstacleTree;
use crate::structs::{sqr, Line, Vector2D};
use crate::RVO_EPSILON;

#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    defaults: Option<AgentDefaults>,
    agents: Vec<Agent>,
    goals: Vec<Vector2D>,
    obstacles: ObstacleSet,
    agent_tree: AgentTree,
    obstacle_tree: ObstacleTree,
    global_time: f64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::from_valid_config(SimulatorConfig::default())
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: SimulatorConfig) -> Self {
        Simulator {
            agent_tree: AgentTree::new(config.max_leaf_size),
            config,
            defaults: None,
            agents: Vec::new(),
            goals: Vec::new(),
            obstacles: ObstacleSet::new(),
            obstacle_tree: ObstacleTree::default(),
            global_time: 0.0,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    // ==================== Configuration ====================

    pub fn time_step(&self) -> f64 {
        self.config.time_step
    }

    pub fn set_time_step(&mut self, time_step: f64) -> Result<()> {
        validate_time_step(time_step)?;
        self.config.time_step = time_step;
        Ok(())
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.config.parallel = parallel;
    }

    /// Sets the template used by [`add_agent`](Self::add_agent).
    pub fn set_agent_defaults(&mut self, defaults: AgentDefaults) -> Result<()> {
        defaults.validate()?;
        debug!(
            radius = defaults.radius,
            max_speed = defaults.max_speed,
            max_neighbors = defaults.max_neighbors,
            "agent defaults set"
        );
        self.defaults = Some(defaults);
        Ok(())
    }

    pub fn agent_defaults(&self) -> Option<&AgentDefaults> {
        self.defaults.as_ref()
    }

    // ==================== Agents ====================

    /// Adds an agent built from the stored defaults and returns its id.
    pub fn add_agent(&mut self, position: Vector2D) -> Result<usize> {
        let defaults = self
            .defaults
            .clone()
            .ok_or(SimulatorError::MissingAgentDefaults)?;
        self.add_agent_with(position, &defaults)
    }

    /// Adds an agent built from `defaults` and returns its id. The agent's
    /// goal starts at its spawn position.
    pub fn add_agent_with(&mut self, position: Vector2D, defaults: &AgentDefaults) -> Result<usize> {
        defaults.validate()?;
        require_finite(position, "agent position must be finite")?;

        let id = self.agents.len();
        self.agents.push(Agent::new(id, position, defaults));
        self.goals.push(position);
        debug!(id, x = position.x, y = position.y, "agent added");
        Ok(id)
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    pub fn agent_mut(&mut self, index: usize) -> Option<&mut Agent> {
        self.agents.get_mut(index)
    }

    fn agent_checked(&mut self, index: usize) -> Result<&mut Agent> {
        let count = self.agents.len();
        self.agents
            .get_mut(index)
            .ok_or(SimulatorError::AgentOutOfRange { index, count })
    }

    pub fn agent_position(&self, index: usize) -> Option<Vector2D> {
        self.agent(index).map(Agent::position)
    }

    pub fn agent_velocity(&self, index: usize) -> Option<Vector2D> {
        self.agent(index).map(Agent::velocity)
    }

    pub fn agent_pref_velocity(&self, index: usize) -> Option<Vector2D> {
        self.agent(index).map(Agent::pref_velocity)
    }

    pub fn agent_radius(&self, index: usize) -> Option<f64> {
        self.agent(index).map(Agent::radius)
    }

    /// Constraint lines the agent respected in the last step.
    pub fn agent_orca_lines(&self, index: usize) -> Option<&[Line]> {
        self.agent(index).map(Agent::orca_lines)
    }

    pub fn set_agent_pref_velocity(&mut self, index: usize, pref_velocity: Vector2D) -> Result<()> {
        self.agent_checked(index)?.set_pref_velocity(pref_velocity)
    }

    pub fn set_agent_position(&mut self, index: usize, position: Vector2D) -> Result<()> {
        self.agent_checked(index)?.set_position(position)
    }

    pub fn set_agent_velocity(&mut self, index: usize, velocity: Vector2D) -> Result<()> {
        self.agent_checked(index)?.set_velocity(velocity)
    }

    // ==================== Goals ====================

    pub fn agent_goal(&self, index: usize) -> Option<Vector2D> {
        self.goals.get(index).copied()
    }

    pub fn set_agent_goal(&mut self, index: usize, goal: Vector2D) -> Result<()> {
        require_finite(goal, "goal must be finite")?;
        let count = self.goals.len();
        let slot = self
            .goals
            .get_mut(index)
            .ok_or(SimulatorError::AgentOutOfRange { index, count })?;
        *slot = goal;
        Ok(())
    }

    /// Replaces every goal at once; `goals[i]` belongs to agent `i`.
    pub fn set_goals(&mut self, goals: Vec<Vector2D>) -> Result<()> {
        if goals.len() != self.agents.len() {
            return Err(SimulatorError::InvalidConfig(
                "goal count must match the agent count",
            ));
        }
        for &goal in &goals {
            require_finite(goal, "goal must be finite")?;
        }
        self.goals = goals;
        Ok(())
    }

    /// Whether every agent is within epsilon (squared distance) of its goal.
    pub fn reached_goal(&self) -> bool {
        self.agents
            .iter()
            .zip(&self.goals)
            .all(|(agent, goal)| (*goal - agent.position).abs_sq() <= RVO_EPSILON)
    }

    /// Points every agent's preferred velocity at its goal at full speed,
    /// shortened on the last step so the agent stops on the goal.
    pub fn steer_toward_goals(&mut self) {
        let time_step = self.config.time_step;
        for (agent, goal) in self.agents.iter_mut().zip(&self.goals) {
            let to_goal = *goal - agent.position;
            let dist_sq = to_goal.abs_sq();

            let pref_velocity = if dist_sq <= RVO_EPSILON {
                Vector2D::ZERO
            } else if dist_sq > sqr(agent.max_speed * time_step) {
                to_goal.normalize() * agent.max_speed
            } else {
                to_goal * (1.0 / time_step)
            };
            agent.pref_velocity = pref_velocity;
        }
    }

    // ==================== Obstacles ====================

    /// Registers a closed polygon (counter-clockwise for solid obstacles, two
    /// vertices for a thin wall) and returns the id of its first vertex.
    /// Fewer than two vertices is a no-op returning `None`.
    ///
    /// Agents ignore obstacles until the next
    /// [`process_obstacles`](Self::process_obstacles).
    pub fn add_obstacle(&mut self, polygon: &[Vector2D]) -> Option<usize> {
        let Some(first) = self.obstacles.add_polygon(polygon) else {
            warn!(vertices = polygon.len(), "ignoring obstacle with fewer than two vertices");
            return None;
        };

        self.obstacle_tree = ObstacleTree::default();
        debug!(first, vertices = polygon.len(), "obstacle added");
        Some(first)
    }

    /// Builds the obstacle tree from every registered polygon.
    pub fn process_obstacles(&mut self) {
        self.obstacle_tree = ObstacleTree::build(&mut self.obstacles);
        debug!(
            polygons = self.obstacles.num_polygons(),
            vertices = self.obstacles.len(),
            split_vertices = self.obstacles.num_split_vertices(),
            nodes = self.obstacle_tree.len(),
            "obstacle tree built"
        );
    }

    pub fn num_obstacle_vertices(&self) -> usize {
        self.obstacles.len()
    }

    pub fn obstacle_vertices(&self) -> &[ObstacleVertex] {
        self.obstacles.vertices()
    }

    pub fn obstacle_vertex(&self, id: usize) -> Option<&ObstacleVertex> {
        self.obstacles.vertex(id)
    }

    /// Whether `q1` and `q2` see each other with `radius` clearance from
    /// every processed obstacle.
    pub fn query_visibility(&self, q1: Vector2D, q2: Vector2D, radius: f64) -> bool {
        self.obstacle_tree
            .query_visibility(&self.obstacles, q1, q2, radius)
    }

    // ==================== Stepping ====================

    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    /// Advances the simulation by one time step.
    pub fn run(&mut self) {
        let time_step = self.config.time_step;
        trace!(
            global_time = self.global_time,
            agents = self.agents.len(),
            "step"
        );

        self.agent_tree.build(self.agents.iter().map(Agent::position));

        let plans: Vec<AvoidancePlan> = {
            let context = PlanningContext {
                agents: &self.agents,
                agent_tree: &self.agent_tree,
                obstacles: &self.obstacles,
                obstacle_tree: &self.obstacle_tree,
                time_step,
            };

            if self.config.parallel {
                self.agents
                    .par_iter()
                    .map(|agent| agent.plan(&context))
                    .collect()
            } else {
                self.agents
                    .iter()
                    .map(|agent| agent.plan(&context))
                    .collect()
            }
        };

        for (agent, plan) in self.agents.iter_mut().zip(plans) {
            agent.commit(plan);
            agent.update(time_step);
        }

        self.global_time += time_step;
    }
}
