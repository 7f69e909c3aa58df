// ABOUTME: Wait strategies for container ports: listening, exposed and mapped.
// ABOUTME: Combines an external TCP dial with a best-effort in-container shell probe.

use std::fmt;
use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::net::TcpStream;

use super::context::WaitContext;
use super::error::{TargetSnafu, WaitError};
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::{ExecOptions, StrategyTarget};
use crate::types::ContainerPort;

/// Exit codes the in-container shell probe reports when the shell itself
/// cannot run. These follow the POSIX shell conventions by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellExitCodes {
    /// The shell exists but cannot be executed.
    pub not_executable: i64,
    /// The shell binary does not exist.
    pub not_found: i64,
}

impl Default for ShellExitCodes {
    fn default() -> Self {
        Self {
            not_executable: 126,
            not_found: 127,
        }
    }
}

/// Which port a [`HostPort`] strategy waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortSelection {
    Fixed(ContainerPort),
    /// Lowest exposed port with a host binding.
    Exposed,
}

/// Waits for a container port to be mapped and accepting connections.
#[derive(Debug, Clone)]
pub struct HostPort {
    port: PortSelection,
    skip_internal_check: bool,
    skip_external_check: bool,
    shell_exit_codes: ShellExitCodes,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl HostPort {
    /// Wait for `port` to be mapped and listening, checked from both sides.
    pub fn for_listening_port(port: ContainerPort) -> Self {
        Self::with_selection(PortSelection::Fixed(port))
    }

    /// Like [`HostPort::for_listening_port`] for the lowest exposed port.
    pub fn for_exposed_port() -> Self {
        Self::with_selection(PortSelection::Exposed)
    }

    /// Wait only for `port` to receive a host binding.
    pub fn for_mapped_port(port: ContainerPort) -> Self {
        Self::for_listening_port(port)
            .skip_internal_check()
            .skip_external_check()
    }

    fn with_selection(port: PortSelection) -> Self {
        Self {
            port,
            skip_internal_check: false,
            skip_external_check: false,
            shell_exit_codes: ShellExitCodes::default(),
            timeout: None,
            poll: PollConfig::default(),
        }
    }

    /// Do not exec the shell probe inside the container.
    pub fn skip_internal_check(mut self) -> Self {
        self.skip_internal_check = true;
        self
    }

    /// Do not dial the mapped port from the host.
    pub fn skip_external_check(mut self) -> Self {
        self.skip_external_check = true;
        self
    }

    /// Exit codes that mean "no usable shell" rather than "not listening".
    pub fn with_shell_exit_codes(mut self, codes: ShellExitCodes) -> Self {
        self.shell_exit_codes = codes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll.poll_interval = interval;
        self
    }

    pub fn with_defaults(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            PortSelection::Fixed(port) if self.skip_internal_check && self.skip_external_check => {
                write!(f, "mapped port {}", port)
            }
            PortSelection::Fixed(port) => write!(f, "listening port {}", port),
            PortSelection::Exposed => write!(f, "exposed port"),
        }
    }
}

/// Shell command that succeeds when something listens on `port` inside the container.
fn internal_check_command(port: u16) -> Vec<String> {
    let script = format!(
        "true && (\n\
         cat /proc/net/tcp* | awk '{{print $2}}' | grep -i :{port:04x} ||\n\
         nc -vz -w 1 localhost {port} ||\n\
         /bin/sh -c '</dev/tcp/localhost/{port}'\n\
         )\n"
    );
    vec!["/bin/sh".to_string(), "-c".to_string(), script]
}

/// Dial failures that only mean nothing is accepting connections yet.
fn is_not_listening(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
    )
}

enum Internal {
    Listening,
    NotListening(i64),
    NoShell,
}

impl HostPort {
    async fn resolve_port(
        &self,
        poller: &mut Poller<'_>,
    ) -> Result<Option<ContainerPort>, WaitError> {
        let target = poller.target();
        match self.port {
            PortSelection::Fixed(port) => Ok(Some(port)),
            PortSelection::Exposed => {
                let inspect = poller
                    .run(target.inspect())
                    .await?
                    .context(TargetSnafu { operation: "inspect" })?;
                let lowest = inspect
                    .ports
                    .iter()
                    .filter(|(_, bindings)| !bindings.is_empty())
                    .map(|(port, _)| *port)
                    .next();
                if lowest.is_none() {
                    poller.not_ready("no exposed ports yet");
                }
                Ok(lowest)
            }
        }
    }

    async fn internal_check(
        &self,
        poller: &mut Poller<'_>,
        port: ContainerPort,
    ) -> Result<Internal, WaitError> {
        let target = poller.target();
        let cmd = internal_check_command(port.number());
        let result = poller
            .run(target.exec(&cmd, &ExecOptions::default()))
            .await?
            .context(TargetSnafu {
                operation: "internal check",
            })?;

        let codes = self.shell_exit_codes;
        Ok(match result.exit_code {
            0 => Internal::Listening,
            code if code == codes.not_executable => {
                tracing::warn!(
                    port = %port,
                    "Shell not executable in container, only external port validated"
                );
                Internal::NoShell
            }
            code if code == codes.not_found => {
                tracing::warn!(
                    port = %port,
                    "Shell not found in container, only external port validated"
                );
                Internal::NoShell
            }
            code => Internal::NotListening(code),
        })
    }
}

#[async_trait]
impl Strategy for HostPort {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval);

        let host = poller
            .run(target.host())
            .await?
            .context(TargetSnafu { operation: "host" })?;

        loop {
            poller.tick().await?;

            let Some(port) = self.resolve_port(&mut poller).await? else {
                continue;
            };

            let mapped = match poller.run(target.mapped_port(port)).await? {
                Ok(mapped) => mapped,
                Err(e) if e.is_port_not_found() => {
                    poller.not_ready(e);
                    continue;
                }
                Err(source) => {
                    return Err(WaitError::Target {
                        operation: "mapped port",
                        source,
                    });
                }
            };

            if !self.skip_external_check {
                match poller.run(TcpStream::connect((host.as_str(), mapped))).await? {
                    Ok(_stream) => {}
                    Err(e) if is_not_listening(e.kind()) => {
                        poller.not_ready(format!("external check {}:{}: {}", host, mapped, e));
                        continue;
                    }
                    Err(e) => {
                        return Err(WaitError::Target {
                            operation: "external check",
                            source: e.into(),
                        });
                    }
                }
            }

            if !self.skip_internal_check {
                match self.internal_check(&mut poller, port).await? {
                    Internal::Listening | Internal::NoShell => {}
                    Internal::NotListening(code) => {
                        poller.not_ready(format!(
                            "internal check for {} exited with code {}",
                            port, code
                        ));
                        continue;
                    }
                }
            }

            tracing::debug!(strategy = %self, port = %port, mapped, "port ready");
            return Ok(());
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn description(&self) -> String {
        self.to_string()
    }
}
