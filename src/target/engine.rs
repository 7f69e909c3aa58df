// ABOUTME: Bollard-based StrategyTarget implementation.
// ABOUTME: Talks to Docker or Podman through the Docker-compatible engine API.

use super::error::TargetError;
use super::types::{
    ByteStream, ContainerStatus, ExecOptions, ExecOutput, HealthStatus, InspectResult,
    PortBinding, PortMap,
};
use super::StrategyTarget;
use crate::types::{ContainerId, ContainerPort, ExecId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{ContainerInspectResponse, ContainerStateStatusEnum, HealthStatusEnum};
use bollard::query_parameters::{
    DownloadFromContainerOptions, InspectContainerOptions, LogsOptions,
};
use futures::StreamExt;
use std::io::{Cursor, Read};

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_container_not_found_error(e: bollard::errors::Error) -> TargetError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => TargetError::NotFound(message.clone()),
        _ => TargetError::Runtime(e.to_string()),
    }
}

fn map_exec_create_error(e: bollard::errors::Error) -> TargetError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => TargetError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => TargetError::NotRunning(message.clone()),
        _ => TargetError::Runtime(e.to_string()),
    }
}

fn map_download_error(e: bollard::errors::Error, path: &str) -> TargetError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            TargetError::NotFound(path.to_string())
        }
        _ => TargetError::Runtime(format!("failed to copy {}: {}", path, e)),
    }
}

/// Host part of a `DOCKER_HOST` value; local sockets resolve to localhost.
fn host_from_docker_host(docker_host: Option<&str>) -> String {
    let Some(value) = docker_host.map(str::trim).filter(|v| !v.is_empty()) else {
        return "localhost".to_string();
    };

    let Some(rest) = value
        .strip_prefix("tcp://")
        .or_else(|| value.strip_prefix("http://"))
        .or_else(|| value.strip_prefix("https://"))
        .or_else(|| value.strip_prefix("ssh://"))
    else {
        return "localhost".to_string();
    };

    let authority = rest.split('/').next().unwrap_or(rest);
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);

    // Bracketed IPv6 literal
    if let Some(stripped) = authority.strip_prefix('[') {
        if let Some((ip, _)) = stripped.split_once(']') {
            return ip.to_string();
        }
    }

    match authority.rsplit_once(':') {
        Some((host, _)) if !host.is_empty() => host.to_string(),
        _ if authority.is_empty() => "localhost".to_string(),
        _ => authority.to_string(),
    }
}

fn parse_status(details: &ContainerInspectResponse) -> ContainerStatus {
    let Some(state) = details.state.as_ref() else {
        return ContainerStatus::default();
    };

    let status = state
        .status
        .as_ref()
        .map(|s| match s {
            ContainerStateStatusEnum::CREATED => "created",
            ContainerStateStatusEnum::RUNNING => "running",
            ContainerStateStatusEnum::PAUSED => "paused",
            ContainerStateStatusEnum::RESTARTING => "restarting",
            ContainerStateStatusEnum::REMOVING => "removing",
            ContainerStateStatusEnum::EXITED => "exited",
            ContainerStateStatusEnum::DEAD => "dead",
            _ => "",
        })
        .unwrap_or_default()
        .to_string();

    let health = state.health.as_ref().and_then(|h| h.status.as_ref()).map(|s| match s {
        HealthStatusEnum::STARTING => HealthStatus::Starting,
        HealthStatusEnum::HEALTHY => HealthStatus::Healthy,
        HealthStatusEnum::UNHEALTHY => HealthStatus::Unhealthy,
        _ => HealthStatus::None,
    });

    ContainerStatus {
        running: state.running.unwrap_or(false),
        oom_killed: state.oom_killed.unwrap_or(false),
        status,
        exit_code: state.exit_code.unwrap_or_default(),
        health,
    }
}

fn parse_ports(details: &ContainerInspectResponse) -> PortMap {
    let mut ports = PortMap::new();

    let Some(raw) = details
        .network_settings
        .as_ref()
        .and_then(|settings| settings.ports.as_ref())
    else {
        return ports;
    };

    for (key, bindings) in raw {
        let Ok(port) = ContainerPort::parse(key) else {
            tracing::debug!(port = %key, "ignoring unparseable port key");
            continue;
        };

        let bindings = bindings
            .iter()
            .flatten()
            .filter_map(|binding| {
                let host_port = binding.host_port.as_deref()?.parse::<u16>().ok()?;
                Some(PortBinding {
                    host_ip: binding.host_ip.clone().unwrap_or_default(),
                    host_port,
                })
            })
            .filter(|binding| binding.host_port != 0)
            .collect();

        ports.insert(port, bindings);
    }

    ports
}

/// Pull the first regular file out of a tar archive.
fn extract_single_file(archive: &[u8], path: &str) -> Result<Vec<u8>, TargetError> {
    let mut archive = tar::Archive::new(Cursor::new(archive));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type().is_file() {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            return Ok(contents);
        }
    }
    Err(TargetError::NotFound(format!("{} is not a regular file", path)))
}

// =============================================================================
// BollardTarget
// =============================================================================

/// StrategyTarget for one container on a Docker-compatible engine.
pub struct BollardTarget {
    client: Docker,
    container: ContainerId,
    host: String,
}

impl BollardTarget {
    /// Wrap an existing client. The engine host is taken from `DOCKER_HOST`.
    pub fn new(client: Docker, container: ContainerId) -> Self {
        let host = host_from_docker_host(std::env::var("DOCKER_HOST").ok().as_deref());
        Self {
            client,
            container,
            host,
        }
    }

    /// Connect using the engine's local defaults (socket or `DOCKER_HOST`).
    pub fn connect_local(container: ContainerId) -> Result<Self, TargetError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| TargetError::Runtime(format!("failed to connect to engine: {}", e)))?;
        Ok(Self::new(client, container))
    }

    /// Override the host that mapped ports are reached through.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    async fn inspect_raw(&self) -> Result<ContainerInspectResponse, TargetError> {
        self.client
            .inspect_container(self.container.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)
    }

    async fn exec_exit_code(&self, exec_id: &ExecId) -> Result<i64, TargetError> {
        let details = self
            .client
            .inspect_exec(exec_id.as_str())
            .await
            .map_err(map_container_not_found_error)?;
        Ok(details.exit_code.unwrap_or(0))
    }
}

#[async_trait]
impl StrategyTarget for BollardTarget {
    async fn host(&self) -> Result<String, TargetError> {
        Ok(self.host.clone())
    }

    async fn inspect(&self) -> Result<InspectResult, TargetError> {
        let details = self.inspect_raw().await?;
        Ok(InspectResult {
            id: details.id.clone().map(ContainerId::new),
            name: details
                .name
                .clone()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            ports: parse_ports(&details),
        })
    }

    async fn mapped_port(&self, port: ContainerPort) -> Result<u16, TargetError> {
        let details = self.inspect_raw().await?;
        parse_ports(&details)
            .get(&port)
            .and_then(|bindings| bindings.first())
            .map(|binding| binding.host_port)
            .ok_or(TargetError::PortNotFound(port))
    }

    async fn logs(&self) -> Result<ByteStream, TargetError> {
        let opts = LogsOptions {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.client.logs(self.container.as_str(), Some(opts));
        let mut buffer = Vec::new();
        while let Some(item) = stream.next().await {
            let output = item.map_err(map_container_not_found_error)?;
            match output {
                bollard::container::LogOutput::StdOut { message }
                | bollard::container::LogOutput::StdErr { message }
                | bollard::container::LogOutput::StdIn { message }
                | bollard::container::LogOutput::Console { message } => {
                    buffer.extend_from_slice(&message);
                }
            }
        }

        Ok(Box::pin(Cursor::new(buffer)))
    }

    async fn exec(&self, cmd: &[String], opts: &ExecOptions) -> Result<ExecOutput, TargetError> {
        let config = bollard::models::ExecConfig {
            cmd: Some(cmd.to_vec()),
            env: if opts.env.is_empty() {
                None
            } else {
                Some(opts.env.clone())
            },
            working_dir: opts.working_dir.clone(),
            user: opts.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let created = self
            .client
            .create_exec(self.container.as_str(), config)
            .await
            .map_err(map_exec_create_error)?;
        let exec_id = ExecId::new(created.id);

        let started = self
            .client
            .start_exec(
                exec_id.as_str(),
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_container_not_found_error)?;

        let mut output = Vec::new();
        if let StartExecResults::Attached { output: mut stream, .. } = started {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bollard::container::LogOutput::StdOut { message })
                    | Ok(bollard::container::LogOutput::StdErr { message })
                    | Ok(bollard::container::LogOutput::Console { message }) => {
                        output.extend_from_slice(&message);
                    }
                    Ok(_) => {}
                    Err(e) => return Err(TargetError::Runtime(e.to_string())),
                }
            }
        }

        let exit_code = self.exec_exit_code(&exec_id).await?;
        tracing::debug!(
            container = %self.container.short(),
            exec = %exec_id.short(),
            exit_code,
            "exec finished"
        );

        Ok(ExecOutput { exit_code, output })
    }

    async fn state(&self) -> Result<ContainerStatus, TargetError> {
        let details = self.inspect_raw().await?;
        Ok(parse_status(&details))
    }

    async fn copy_from_container(&self, path: &str) -> Result<ByteStream, TargetError> {
        let opts = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let mut stream = self
            .client
            .download_from_container(self.container.as_str(), Some(opts));
        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_download_error(e, path))?;
            archive.extend_from_slice(&chunk);
        }

        let contents = extract_single_file(&archive, path)?;
        Ok(Box::pin(Cursor::new(contents)))
    }
}
