// ABOUTME: The capability surface wait strategies poll a container through.
// ABOUTME: Defines StrategyTarget plus the bollard-backed implementation.

mod engine;
mod error;
mod types;

pub use engine::BollardTarget;
pub use error::TargetError;
pub use types::{
    ByteStream, ContainerStatus, ExecOptions, ExecOutput, HealthStatus, InspectResult,
    PortBinding, PortMap,
};

use crate::types::ContainerPort;
use async_trait::async_trait;

/// Read-only access to one running (or recently running) container.
///
/// Every method may be called repeatedly and from several concurrent
/// strategy invocations; implementations are responsible for their own
/// synchronisation. Strategies never cache what these return.
#[async_trait]
pub trait StrategyTarget: Send + Sync {
    /// Host or IP of the engine, reachable from this process.
    async fn host(&self) -> Result<String, TargetError>;

    /// Port and network metadata.
    async fn inspect(&self) -> Result<InspectResult, TargetError>;

    /// Host port currently bound to `port`.
    ///
    /// Fails with [`TargetError::PortNotFound`] while the engine has not
    /// allocated a binding yet.
    async fn mapped_port(&self, port: ContainerPort) -> Result<u16, TargetError>;

    /// Everything the container has logged so far, stdout and stderr combined.
    async fn logs(&self) -> Result<ByteStream, TargetError>;

    /// Run a one-shot command and wait for it to finish.
    async fn exec(&self, cmd: &[String], opts: &ExecOptions) -> Result<ExecOutput, TargetError>;

    /// Current lifecycle state.
    async fn state(&self) -> Result<ContainerStatus, TargetError>;

    /// Contents of a single file inside the container.
    ///
    /// Fails with [`TargetError::NotFound`] while the path does not exist.
    async fn copy_from_container(&self, path: &str) -> Result<ByteStream, TargetError>;
}
