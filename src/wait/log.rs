// ABOUTME: Wait strategy that matches the container's log output.
// ABOUTME: Plain substring or regular expression, optionally requiring N occurrences.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use snafu::ResultExt;
use tokio::io::AsyncReadExt;

use super::context::WaitContext;
use super::error::{ReadSnafu, WaitError};
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::StrategyTarget;

/// Waits until the log contains `message` at least `occurrence` times.
#[derive(Debug, Clone)]
pub struct ForLog {
    message: String,
    is_regex: bool,
    occurrence: usize,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForLog {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_regex: false,
            occurrence: 1,
            timeout: None,
            poll: PollConfig::default(),
        }
    }

    /// Treat the message as a regular expression.
    pub fn as_regex(mut self) -> Self {
        self.is_regex = true;
        self
    }

    /// Require this many matches; values below one are treated as one.
    pub fn with_occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = occurrence.max(1);
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

    /// Replace the fallback timeout and poll interval.
    pub fn with_defaults(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    fn matcher(&self) -> Result<Matcher<'_>, WaitError> {
        if self.is_regex {
            let regex = Regex::new(&self.message).map_err(|e| WaitError::InvalidConfig {
                message: format!("log pattern {:?}: {}", self.message, e),
            })?;
            Ok(Matcher::Regex(regex))
        } else {
            Ok(Matcher::Plain(&self.message))
        }
    }
}

enum Matcher<'a> {
    Plain(&'a str),
    Regex(Regex),
}

impl Matcher<'_> {
    fn count(&self, haystack: &str) -> usize {
        match self {
            Matcher::Plain(needle) => haystack.matches(needle).count(),
            Matcher::Regex(regex) => regex.find_iter(haystack).count(),
        }
    }
}

impl fmt::Display for ForLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_regex { "pattern" } else { "message" };
        write!(f, "log {} {:?}", kind, self.message)?;
        if self.occurrence > 1 {
            write!(f, " x{}", self.occurrence)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Strategy for ForLog {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let matcher = self.matcher()?;
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval);

        loop {
            poller.tick().await?;

            let mut stream = match poller.run(target.logs()).await? {
                Ok(stream) => stream,
                Err(e) if e.is_not_found() => {
                    poller.not_ready(e);
                    continue;
                }
                Err(e) => {
                    return Err(WaitError::Target {
                        operation: "logs",
                        source: e,
                    });
                }
            };

            let mut raw = Vec::new();
            poller
                .run(stream.read_to_end(&mut raw))
                .await?
                .context(ReadSnafu { stream: "logs" })?;

            let text = String::from_utf8_lossy(&raw);
            let found = matcher.count(&text);
            if found >= self.occurrence {
                tracing::debug!(strategy = %self, found, "log matched");
                return Ok(());
            }

            poller.not_ready(format!(
                "found {} of {} occurrences of {:?}",
                found, self.occurrence, self.message
            ));
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn description(&self) -> String {
        self.to_string()
    }
}
