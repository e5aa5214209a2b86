//! # RVO Core
//!
//! Multi-agent local collision avoidance based on Optimal Reciprocal
//! Collision Avoidance (ORCA), with optional Python bindings.
//!
//! ## Components
//!
//! - **Simulator**: owns agents, goals and obstacles and advances them in
//!   discrete time steps.
//! - **Spatial indices**: a k-d tree over agent positions and a BSP tree over
//!   obstacle edges for neighbor and visibility queries.
//! - **ORCA**: half-plane constraints in velocity space induced by nearby
//!   agents and obstacle edges.
//! - **Linear programs**: an incremental 2D solver with a 3D relaxation for
//!   infeasible constraint sets.
//!
//! ## Usage
//!
//! ```no_run
//! use rvo_core::{AgentDefaults, Simulator, Vector2D};
//!
//! let mut sim = Simulator::new();
//! sim.set_agent_defaults(AgentDefaults::new(15.0, 10, 10.0, 10.0, 1.5, 2.0))?;
//! let id = sim.add_agent(Vector2D::new(-10.0, 0.0))?;
//! sim.set_agent_goal(id, Vector2D::new(10.0, 0.0))?;
//!
//! while !sim.reached_goal() {
//!     sim.steer_toward_goals();
//!     sim.run();
//! }
//! # Ok::<(), rvo_core::SimulatorError>(())
//! ```

pub mod agent;
mod agent_tree;
pub mod config;
pub mod error;
pub mod linear_program;
mod neighbors;
pub mod obstacle;
mod obstacle_tree;
mod orca;
pub mod simulator;
pub mod structs;

#[cfg(feature = "python")]
mod python;

pub use agent::Agent;
pub use config::{AgentDefaults, SimulatorConfig};
pub use error::{Result, SimulatorError};
pub use linear_program::{
    solve_2d_linear_program, solve_3d_linear_program, LinearProgramOutcome, OptimalValue,
};
pub use obstacle::{ObstacleSet, ObstacleVertex};
pub use simulator::Simulator;
pub use structs::{abs_sq, det, dist_sq_point_line_segment, left_of, sqr, Line, Vector2D};

/// Tolerance used by the geometric predicates and goal checks.
pub const RVO_EPSILON: f64 = 0.01;
