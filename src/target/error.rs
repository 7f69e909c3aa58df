// ABOUTME: Errors raised by StrategyTarget implementations.
// ABOUTME: Separates "not there yet" conditions from unusable-target failures.

use crate::types::ContainerPort;

/// Errors from target operations.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("port not found: {0}")]
    PortNotFound(ContainerPort),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TargetError {
    /// The requested object (container, file) does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TargetError::NotFound(_))
    }

    /// The requested port has no host binding yet.
    pub fn is_port_not_found(&self) -> bool {
        matches!(self, TargetError::PortNotFound(_))
    }
}
