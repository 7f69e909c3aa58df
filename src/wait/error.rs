// ABOUTME: Error taxonomy for wait strategies, built with SNAFU.
// ABOUTME: Terminal container states, transport failures, timeouts and configuration errors.

use snafu::Snafu;

use super::context::DoneReason;
use super::file::MatcherError;
use crate::target::TargetError;

fn last_suffix(last: &Option<String>) -> String {
    match last {
        Some(last) => format!(": {last}"),
        None => String::new(),
    }
}

/// Failure of a wait strategy.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WaitError {
    #[snafu(display("container crashed with out-of-memory (OOMKilled)"))]
    ContainerOomKilled,

    #[snafu(display("container exited with code {exit_code}"))]
    ContainerExited { exit_code: i64 },

    #[snafu(display("unexpected container status {status:?}"))]
    UnexpectedStatus { status: String },

    #[snafu(display("get state: {source}"))]
    State { source: TargetError },

    #[snafu(display("{operation}: {source}"))]
    Target {
        operation: &'static str,
        source: TargetError,
    },

    #[snafu(display("http request: {message}"))]
    Http { message: String },

    #[snafu(display("read {stream}: {source}"))]
    Read {
        stream: &'static str,
        source: std::io::Error,
    },

    #[snafu(display("matcher: {source}"))]
    Matcher { source: MatcherError },

    #[snafu(display("{reason}{}", last_suffix(last)))]
    Timeout {
        reason: DoneReason,
        last: Option<String>,
    },

    #[snafu(display("no wait strategy supplied"))]
    NoStrategySupplied,

    #[snafu(display("no exposed tcp ports or mapped ports - cannot wait for status"))]
    NoExposedPorts,

    #[snafu(display("invalid wait configuration: {message}"))]
    InvalidConfig { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitErrorKind {
    /// Container exited, was OOM-killed or is in a non-running status.
    TerminalContainerState,
    /// Talking to the target (or the probed service) failed unexpectedly.
    Transport,
    /// Deadline or cancellation reached before the condition held.
    Timeout,
    /// The strategy or target cannot be used as configured.
    Configuration,
}

impl WaitError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> WaitErrorKind {
        match self {
            WaitError::ContainerOomKilled
            | WaitError::ContainerExited { .. }
            | WaitError::UnexpectedStatus { .. } => WaitErrorKind::TerminalContainerState,
            WaitError::State { .. }
            | WaitError::Target { .. }
            | WaitError::Http { .. }
            | WaitError::Read { .. }
            | WaitError::Matcher { .. } => WaitErrorKind::Transport,
            WaitError::Timeout { .. } => WaitErrorKind::Timeout,
            WaitError::NoStrategySupplied
            | WaitError::NoExposedPorts
            | WaitError::InvalidConfig { .. } => WaitErrorKind::Configuration,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == WaitErrorKind::Timeout
    }

    pub fn is_terminal(&self) -> bool {
        self.kind() == WaitErrorKind::TerminalContainerState
    }

    /// The target error underneath a transport failure, if any.
    pub fn target_error(&self) -> Option<&TargetError> {
        match self {
            WaitError::State { source } | WaitError::Target { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_messages_are_stable() {
        assert_eq!(
            WaitError::ContainerOomKilled.to_string(),
            "container crashed with out-of-memory (OOMKilled)"
        );
        assert_eq!(
            WaitError::ContainerExited { exit_code: 3 }.to_string(),
            "container exited with code 3"
        );
        assert_eq!(
            WaitError::UnexpectedStatus {
                status: "dead".to_string()
            }
            .to_string(),
            "unexpected container status \"dead\""
        );
    }

    #[test]
    fn timeout_message_carries_last_reason() {
        let err = WaitError::Timeout {
            reason: DoneReason::DeadlineExceeded,
            last: Some("exit code 1 did not match".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "deadline exceeded: exit code 1 did not match"
        );
        assert!(err.is_timeout());

        let bare = WaitError::Timeout {
            reason: DoneReason::Cancelled,
            last: None,
        };
        assert_eq!(bare.to_string(), "context cancelled");
    }

    #[test]
    fn kinds_classify_variants() {
        assert!(WaitError::ContainerOomKilled.is_terminal());
        assert_eq!(
            WaitError::NoStrategySupplied.kind(),
            WaitErrorKind::Configuration
        );
        let err = WaitError::Target {
            operation: "exec",
            source: TargetError::Runtime("boom".to_string()),
        };
        assert_eq!(err.kind(), WaitErrorKind::Transport);
        assert!(err.target_error().is_some());
        assert_eq!(err.to_string(), "exec: runtime error: boom");
    }
}
