use thiserror::Error;

/// Errors reported to callers of the simulator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    /// An agent was created from the default template before one was set.
    #[error("agent defaults must be set before adding agents")]
    MissingAgentDefaults,
    /// Indicates a configuration value that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A per-agent operation addressed an agent that does not exist.
    #[error("agent index {index} is out of range ({count} agents)")]
    AgentOutOfRange { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
