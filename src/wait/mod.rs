// ABOUTME: Readiness wait strategies and the trait they share.
// ABOUTME: Leaf strategies poll one signal each; ForAll composes them.

mod all;
mod context;
mod error;
mod exec;
mod exit;
mod file;
mod health;
mod host_port;
mod http;
mod log;
mod poll;
mod sql;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::target::StrategyTarget;
use crate::types::ContainerPort;

pub use all::ForAll;
pub use context::{DoneReason, WaitContext};
pub use error::{WaitError, WaitErrorKind};
pub use exec::ForExec;
pub use exit::ForExit;
pub use file::{ForFile, MatcherError};
pub use health::ForHealthCheck;
pub use host_port::{HostPort, ShellExitCodes};
pub use http::ForHttp;
pub use log::ForLog;
pub use poll::{check_state, check_target, PollConfig};
pub use sql::{ForSql, SqlConnection, SqlDriver, SqlError, DEFAULT_SQL_QUERY};

/// A readiness condition evaluated against a container.
///
/// Implementations are reusable configuration; all polling state lives in a
/// single `wait_until_ready` call.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Block until the container is ready, the context ends, or a terminal
    /// container state is observed.
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError>;

    /// The explicitly configured timeout, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Short human-readable summary used in logs.
    fn description(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

#[async_trait]
impl<S: Strategy + ?Sized> Strategy for Box<S> {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        (**self).wait_until_ready(ctx, target).await
    }

    fn timeout(&self) -> Option<Duration> {
        (**self).timeout()
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

#[async_trait]
impl<S: Strategy + ?Sized> Strategy for Arc<S> {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        (**self).wait_until_ready(ctx, target).await
    }

    fn timeout(&self) -> Option<Duration> {
        (**self).timeout()
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

pub fn for_log(message: impl Into<String>) -> ForLog {
    ForLog::new(message)
}

pub fn for_listening_port(port: ContainerPort) -> HostPort {
    HostPort::for_listening_port(port)
}

pub fn for_exposed_port() -> HostPort {
    HostPort::for_exposed_port()
}

pub fn for_mapped_port(port: ContainerPort) -> HostPort {
    HostPort::for_mapped_port(port)
}

pub fn for_http(path: impl Into<String>) -> ForHttp {
    ForHttp::new(path)
}

pub fn for_exec<I, S>(cmd: I) -> ForExec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ForExec::new(cmd)
}

pub fn for_file(path: impl Into<String>) -> ForFile {
    ForFile::new(path)
}

pub fn for_health_check() -> ForHealthCheck {
    ForHealthCheck::new()
}

pub fn for_exit() -> ForExit {
    ForExit::new()
}

/// Shorthand for [`ForAll::new`].
pub fn for_all(strategies: Vec<Box<dyn Strategy>>) -> ForAll {
    ForAll::new(strategies)
}
