// ABOUTME: Data returned by StrategyTarget operations.
// ABOUTME: Container state, port map, exec options/output and byte streams.

use crate::types::{ContainerId, ContainerPort};
use std::collections::BTreeMap;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Readable byte stream for logs and copied files.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Host bindings per container port. Exposed but unbound ports map to an
/// empty list.
pub type PortMap = BTreeMap<ContainerPort, Vec<PortBinding>>;

/// Lifecycle state of a container as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStatus {
    /// Main process is running.
    pub running: bool,
    /// The kernel OOM killer terminated the container.
    pub oom_killed: bool,
    /// Engine status string ("running", "exited", "created", "dead", ...).
    pub status: String,
    /// Exit code of the main process, meaningful once exited.
    pub exit_code: i64,
    /// Health status, if the image or container defines a healthcheck.
    pub health: Option<HealthStatus>,
}

impl ContainerStatus {
    /// A running container without a healthcheck.
    pub fn running() -> Self {
        Self {
            running: true,
            status: "running".to_string(),
            ..Default::default()
        }
    }

    /// An exited container.
    pub fn exited(exit_code: i64) -> Self {
        Self {
            status: "exited".to_string(),
            exit_code,
            ..Default::default()
        }
    }
}

/// Health state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Starting => write!(f, "starting"),
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::None => write!(f, "none"),
        }
    }
}

/// A host-side binding of a container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Host interface, e.g. "0.0.0.0" or "::".
    pub host_ip: String,
    pub host_port: u16,
}

/// Subset of container inspection the strategies need.
#[derive(Debug, Clone, Default)]
pub struct InspectResult {
    pub id: Option<ContainerId>,
    pub name: String,
    pub ports: PortMap,
}

impl InspectResult {
    /// TCP ports that have at least one host binding, lowest first.
    pub fn bound_tcp_ports(&self) -> impl Iterator<Item = ContainerPort> + '_ {
        self.ports
            .iter()
            .filter(|(port, bindings)| port.is_tcp() && !bindings.is_empty())
            .map(|(port, _)| *port)
    }
}

/// Options for exec'ing a command.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// User to run as.
    pub user: Option<String>,
    /// Environment variables in KEY=value form.
    pub env: Vec<String>,
    /// Working directory.
    pub working_dir: Option<String>,
}

/// Result of an exec.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub exit_code: i64,
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
}

impl ExecOutput {
    pub fn new(exit_code: i64) -> Self {
        Self {
            exit_code,
            output: Vec::new(),
        }
    }
}
