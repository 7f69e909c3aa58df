// ABOUTME: Wait strategy that runs a command inside the container each tick.
// ABOUTME: Ready once the exit code (and optionally the output) matches.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;

use super::context::WaitContext;
use super::error::{TargetSnafu, WaitError};
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::{ExecOptions, StrategyTarget};

type ExitCodeMatcher = Arc<dyn Fn(i64) -> bool + Send + Sync>;
type ResponseMatcher = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Waits until a command exits with an accepted code.
#[derive(Clone)]
pub struct ForExec {
    cmd: Vec<String>,
    options: ExecOptions,
    exit_code_matcher: ExitCodeMatcher,
    response_matcher: Option<ResponseMatcher>,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForExec {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            options: ExecOptions::default(),
            exit_code_matcher: Arc::new(|code| code == 0),
            response_matcher: None,
            timeout: None,
            poll: PollConfig::default(),
        }
    }

    /// Accept exactly this exit code.
    pub fn with_exit_code(self, exit_code: i64) -> Self {
        self.with_exit_code_matcher(move |code| code == exit_code)
    }

    pub fn with_exit_code_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(i64) -> bool + Send + Sync + 'static,
    {
        self.exit_code_matcher = Arc::new(matcher);
        self
    }

    /// Additionally require the combined output to satisfy `matcher`.
    pub fn with_response_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.response_matcher = Some(Arc::new(matcher));
        self
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
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

impl fmt::Debug for ForExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForExec")
            .field("cmd", &self.cmd)
            .field("options", &self.options)
            .field("has_response_matcher", &self.response_matcher.is_some())
            .field("timeout", &self.timeout)
            .field("poll", &self.poll)
            .finish()
    }
}

impl fmt::Display for ForExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec {:?}", self.cmd)
    }
}

#[async_trait]
impl Strategy for ForExec {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval);

        loop {
            poller.tick().await?;

            let result = poller
                .run(target.exec(&self.cmd, &self.options))
                .await?
                .context(TargetSnafu { operation: "exec" })?;

            if !(self.exit_code_matcher)(result.exit_code) {
                poller.not_ready(format!("exit code {} not accepted", result.exit_code));
                continue;
            }

            if let Some(matcher) = &self.response_matcher {
                if !matcher(&result.output) {
                    poller.not_ready("command output did not match");
                    continue;
                }
            }

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
