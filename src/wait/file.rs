// ABOUTME: Wait strategy that waits for a file to appear inside the container.
// ABOUTME: Optionally hands the file contents to a caller-supplied matcher.

use std::error::Error as StdError;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::io::AsyncReadExt;

use super::context::WaitContext;
use super::error::{MatcherSnafu, ReadSnafu, WaitError};
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::StrategyTarget;

/// Error type file matchers may return.
pub type MatcherError = Box<dyn StdError + Send + Sync>;

type FileMatcher = Arc<dyn Fn(&mut dyn Read) -> Result<(), MatcherError> + Send + Sync>;

/// Waits until `path` can be copied out of the container.
#[derive(Clone)]
pub struct ForFile {
    path: String,
    matcher: Option<FileMatcher>,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            matcher: None,
            timeout: None,
            poll: PollConfig::default(),
        }
    }

    /// Inspect the file once it exists; an error fails the strategy.
    pub fn with_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&mut dyn Read) -> Result<(), MatcherError> + Send + Sync + 'static,
    {
        self.matcher = Some(Arc::new(matcher));
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

impl fmt::Debug for ForFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForFile")
            .field("path", &self.path)
            .field("has_matcher", &self.matcher.is_some())
            .field("timeout", &self.timeout)
            .field("poll", &self.poll)
            .finish()
    }
}

impl fmt::Display for ForFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}", self.path)
    }
}

#[async_trait]
impl Strategy for ForFile {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval);

        loop {
            poller.tick().await?;

            let mut stream = match poller.run(target.copy_from_container(&self.path)).await? {
                Ok(stream) => stream,
                Err(e) if e.is_not_found() => {
                    poller.not_ready(e);
                    continue;
                }
                Err(e) => {
                    return Err(WaitError::Target {
                        operation: "copy from container",
                        source: e,
                    });
                }
            };

            let Some(matcher) = &self.matcher else {
                return Ok(());
            };

            let mut contents = Vec::new();
            poller
                .run(stream.read_to_end(&mut contents))
                .await?
                .context(ReadSnafu { stream: "file" })?;

            return matcher(&mut Cursor::new(contents)).context(MatcherSnafu);
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn description(&self) -> String {
        self.to_string()
    }
}
