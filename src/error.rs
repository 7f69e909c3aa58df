// ABOUTME: Application-wide error types for container-wait.
// ABOUTME: Covers config loading and CLI failures; strategies use WaitError.

use std::path::PathBuf;
use thiserror::Error;

use crate::target::TargetError;
use crate::wait::WaitError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("container engine: {0}")]
    Target(#[from] TargetError),

    #[error("container not ready: {0}")]
    Wait(#[from] WaitError),
}

pub type Result<T> = std::result::Result<T, Error>;
