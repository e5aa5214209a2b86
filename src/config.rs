//! # Configuration
//!
//! Simulation-wide settings and the per-agent parameter template applied at
//! agent-creation time. Both are plain values validated on use.

use crate::error::{Result, SimulatorError};
use crate::structs::Vector2D;

/// Simulation-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Duration of one simulation step (time unit agnostic).
    pub time_step: f64,
    /// Largest agent count stored in an agent-tree leaf.
    pub max_leaf_size: usize,
    /// Plan agent velocities on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            time_step: 0.25,
            max_leaf_size: 10,
            parallel: false,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        validate_time_step(self.time_step)?;
        if self.max_leaf_size == 0 {
            return Err(SimulatorError::InvalidConfig(
                "max_leaf_size must be at least 1",
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_time_step(time_step: f64) -> Result<()> {
    require_positive(time_step, "time_step must be positive and finite")
}

/// Parameters copied into every agent created from this template.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefaults {
    /// Maximum center-to-center distance at which other agents are considered.
    pub neighbor_dist: f64,
    /// Maximum number of agent neighbors taken into account.
    pub max_neighbors: usize,
    /// How far ahead (in time) collisions with other agents are avoided.
    pub time_horizon: f64,
    /// How far ahead (in time) collisions with obstacles are avoided.
    pub time_horizon_obst: f64,
    pub radius: f64,
    pub max_speed: f64,
    /// Initial velocity.
    pub velocity: Vector2D,
}

impl AgentDefaults {
    pub fn new(
        neighbor_dist: f64,
        max_neighbors: usize,
        time_horizon: f64,
        time_horizon_obst: f64,
        radius: f64,
        max_speed: f64,
    ) -> Self {
        AgentDefaults {
            neighbor_dist,
            max_neighbors,
            time_horizon,
            time_horizon_obst,
            radius,
            max_speed,
            velocity: Vector2D::ZERO,
        }
    }

    pub fn with_velocity(mut self, velocity: Vector2D) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_non_negative(self.neighbor_dist, "neighbor_dist must be non-negative and finite")?;
        require_positive(self.time_horizon, "time_horizon must be positive and finite")?;
        require_positive(
            self.time_horizon_obst,
            "time_horizon_obst must be positive and finite",
        )?;
        require_non_negative(self.radius, "radius must be non-negative and finite")?;
        require_non_negative(self.max_speed, "max_speed must be non-negative and finite")?;
        require_finite(self.velocity, "velocity must be finite")
    }
}

pub(crate) fn require_positive(value: f64, message: &'static str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimulatorError::InvalidConfig(message));
    }
    Ok(())
}

pub(crate) fn require_non_negative(value: f64, message: &'static str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimulatorError::InvalidConfig(message));
    }
    Ok(())
}

pub(crate) fn require_finite(value: Vector2D, message: &'static str) -> Result<()> {
    if !value.is_finite() {
        return Err(SimulatorError::InvalidConfig(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AgentDefaults {
        AgentDefaults::new(15.0, 10, 10.0, 10.0, 1.5, 2.0)
    }

    #[test]
    fn test_simulator_config_default_is_valid() {
        let config = SimulatorConfig::default();
        assert_eq!(config.time_step, 0.25);
        assert_eq!(config.max_leaf_size, 10);
        assert!(!config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_simulator_config_rejects_bad_time_step() {
        for time_step in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = SimulatorConfig {
                time_step,
                ..SimulatorConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(SimulatorError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_simulator_config_rejects_zero_leaf_size() {
        let config = SimulatorConfig {
            max_leaf_size: 0,
            ..SimulatorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_agent_defaults_new_zero_velocity() {
        let d = defaults();
        assert_eq!(d.velocity, Vector2D::ZERO);
        assert!(d.validate().is_ok());

        let moving = d.with_velocity(Vector2D::new(1.0, 0.0));
        assert_eq!(moving.velocity, Vector2D::new(1.0, 0.0));
    }

    #[test]
    fn test_agent_defaults_rejects_bad_values() {
        let mut d = defaults();
        d.time_horizon = 0.0;
        assert!(d.validate().is_err());

        let mut d = defaults();
        d.time_horizon_obst = -2.0;
        assert!(d.validate().is_err());

        let mut d = defaults();
        d.radius = f64::NAN;
        assert!(d.validate().is_err());

        let mut d = defaults();
        d.max_speed = -1.0;
        assert!(d.validate().is_err());

        let mut d = defaults();
        d.neighbor_dist = f64::INFINITY;
        assert!(d.validate().is_err());
    }
}
