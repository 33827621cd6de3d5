//! Error types for the action runtime.

use actuator_core::error::ActuatorError;

/// Errors that finish a dispatched task or fail a single tick.
///
/// These never propagate to the planner directly; a task's error is only
/// observed when the promise queue is flushed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid action input: {0}")]
    InvalidInput(String),
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Connector failed: {0}")]
    ConnectFailed(String),
    #[error("Action rejected: {0}")]
    Rejected(String),
    #[error("Tick failed: {0}")]
    TickFailed(String),
    #[error("Action task aborted: {0}")]
    TaskAborted(String),
}

/// Errors raised while building the registry at startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate action label: {0}")]
    DuplicateLabel(String),
    #[error("Unknown action interface: {0}")]
    UnknownInterface(String),
    #[error("Unknown implementation '{implementation}' for action {action}")]
    UnknownImplementation {
        action: String,
        implementation: String,
    },
    #[error("Unknown connector '{connector}' for action {action}")]
    UnknownConnector { action: String, connector: String },
    #[error("Invalid option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },
}

impl From<RegistryError> for ActuatorError {
    fn from(err: RegistryError) -> Self {
        ActuatorError::Registry(err.to_string())
    }
}

/// Errors from the worker supervisor.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Failed to spawn worker {name}: {reason}")]
    Spawn { name: String, reason: String },
    #[error("Supervisor has been shut down")]
    ShutDown,
}

impl From<SupervisorError> for ActuatorError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::ShutDown => ActuatorError::ShuttingDown,
            other => ActuatorError::Worker(other.to_string()),
        }
    }
}
