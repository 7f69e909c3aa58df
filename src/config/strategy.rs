// ABOUTME: One entry of a wait plan's strategy list and its conversion into a Strategy.
// ABOUTME: Entries are tagged by `type` and share optional timeout/poll_interval overrides.

use std::collections::BTreeMap;
use std::time::Duration;

use hyper::{Method, StatusCode};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::target::ExecOptions;
use crate::types::ContainerPort;
use crate::wait::{
    ForExec, ForExit, ForFile, ForHealthCheck, ForHttp, ForLog, HostPort, PollConfig, Strategy,
};

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    #[serde(flatten)]
    pub kind: StrategyKind,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyKind {
    Log {
        message: String,
        #[serde(default)]
        regex: bool,
        #[serde(default = "default_occurrence")]
        occurrence: usize,
    },
    ListeningPort {
        port: ContainerPort,
        #[serde(default)]
        skip_internal_check: bool,
        #[serde(default)]
        skip_external_check: bool,
    },
    ExposedPort {
        #[serde(default)]
        skip_internal_check: bool,
        #[serde(default)]
        skip_external_check: bool,
    },
    MappedPort {
        port: ContainerPort,
    },
    Http {
        #[serde(default = "default_http_path")]
        path: String,
        #[serde(default)]
        port: Option<ContainerPort>,
        #[serde(default = "default_http_method")]
        method: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        status: Option<u16>,
    },
    Exec {
        command: Vec<String>,
        #[serde(default)]
        exit_code: i64,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        env: Vec<String>,
        #[serde(default)]
        working_dir: Option<String>,
    },
    File {
        path: String,
    },
    Healthy {},
    Exit {},
}

fn default_occurrence() -> usize {
    1
}

fn default_http_path() -> String {
    "/".to_string()
}

fn default_http_method() -> String {
    "GET".to_string()
}

// Every leaf exposes the same timing builders.
macro_rules! timed {
    ($strategy:expr, $entry:expr, $defaults:expr) => {{
        let mut strategy = $strategy.with_defaults($defaults);
        if let Some(timeout) = $entry.timeout {
            strategy = strategy.with_timeout(timeout);
        }
        if let Some(interval) = $entry.poll_interval {
            strategy = strategy.with_poll_interval(interval);
        }
        Box::new(strategy) as Box<dyn Strategy>
    }};
}

impl StrategyConfig {
    /// Build the strategy, validating what serde cannot.
    pub fn build(&self, defaults: PollConfig) -> Result<Box<dyn Strategy>> {
        let strategy = match &self.kind {
            StrategyKind::Log {
                message,
                regex,
                occurrence,
            } => {
                let mut log = ForLog::new(message.clone()).with_occurrence(*occurrence);
                if *regex {
                    Regex::new(message).map_err(|e| invalid("log", e))?;
                    log = log.as_regex();
                }
                timed!(log, self, defaults)
            }
            StrategyKind::ListeningPort {
                port,
                skip_internal_check,
                skip_external_check,
            } => timed!(
                skip_checks(
                    HostPort::for_listening_port(*port),
                    *skip_internal_check,
                    *skip_external_check
                ),
                self,
                defaults
            ),
            StrategyKind::ExposedPort {
                skip_internal_check,
                skip_external_check,
            } => timed!(
                skip_checks(
                    HostPort::for_exposed_port(),
                    *skip_internal_check,
                    *skip_external_check
                ),
                self,
                defaults
            ),
            StrategyKind::MappedPort { port } => {
                timed!(HostPort::for_mapped_port(*port), self, defaults)
            }
            StrategyKind::Http {
                path,
                port,
                method,
                headers,
                body,
                status,
            } => {
                let method = Method::from_bytes(method.as_bytes()).map_err(|e| invalid("http", e))?;
                let mut http = ForHttp::new(path.clone()).with_method(method);
                if let Some(port) = port {
                    if !port.is_tcp() {
                        return Err(invalid("http", format!("port {} is not tcp", port)));
                    }
                    http = http.with_port(*port);
                }
                for (name, value) in headers {
                    http = http.with_header(name.clone(), value.clone());
                }
                if let Some(body) = body {
                    http = http.with_body(body.clone());
                }
                if let Some(status) = status {
                    StatusCode::from_u16(*status).map_err(|e| invalid("http", e))?;
                    http = http.with_status(*status);
                }
                timed!(http, self, defaults)
            }
            StrategyKind::Exec {
                command,
                exit_code,
                user,
                env,
                working_dir,
            } => {
                if command.is_empty() {
                    return Err(invalid("exec", "command must not be empty"));
                }
                let options = ExecOptions {
                    user: user.clone(),
                    env: env.clone(),
                    working_dir: working_dir.clone(),
                };
                let exec = ForExec::new(command.clone())
                    .with_exit_code(*exit_code)
                    .with_options(options);
                timed!(exec, self, defaults)
            }
            StrategyKind::File { path } => {
                if path.is_empty() {
                    return Err(invalid("file", "path must not be empty"));
                }
                timed!(ForFile::new(path.clone()), self, defaults)
            }
            StrategyKind::Healthy {} => timed!(ForHealthCheck::new(), self, defaults),
            StrategyKind::Exit {} => timed!(ForExit::new(), self, defaults),
        };

        Ok(strategy)
    }
}

fn skip_checks(strategy: HostPort, internal: bool, external: bool) -> HostPort {
    let strategy = if internal {
        strategy.skip_internal_check()
    } else {
        strategy
    };
    if external {
        strategy.skip_external_check()
    } else {
        strategy
    }
}

fn invalid(kind: &str, reason: impl std::fmt::Display) -> Error {
    Error::InvalidConfig(format!("{} strategy: {}", kind, reason))
}
