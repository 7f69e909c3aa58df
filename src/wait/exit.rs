// ABOUTME: Wait strategy that waits for the container to stop.
// ABOUTME: Used for one-shot containers; a removed container also counts as stopped.

use std::time::Duration;

use async_trait::async_trait;

use super::context::WaitContext;
use super::error::WaitError;
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::StrategyTarget;

/// Waits until the container is no longer running.
#[derive(Debug, Clone, Default)]
pub struct ForExit {
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForExit {
    pub fn new() -> Self {
        Self::default()
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

#[async_trait]
impl Strategy for ForExit {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        // Exiting is the goal, so no running-state guard.
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval).unguarded();

        loop {
            poller.tick().await?;

            match poller.run(target.state()).await? {
                Ok(state) if !state.running => return Ok(()),
                Ok(_) => poller.not_ready("container still running"),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(source) => return Err(WaitError::State { source }),
            }
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn description(&self) -> String {
        "container exit".to_string()
    }
}
