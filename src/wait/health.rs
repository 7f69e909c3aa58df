// ABOUTME: Wait strategy for the engine-reported healthcheck status.
// ABOUTME: Ready once the container's health becomes "healthy".

use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;

use super::context::WaitContext;
use super::error::{StateSnafu, WaitError};
use super::poll::{check_state, PollConfig, Poller};
use super::Strategy;
use crate::target::{HealthStatus, StrategyTarget};

/// Waits for the container healthcheck to report healthy.
#[derive(Debug, Clone, Default)]
pub struct ForHealthCheck {
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForHealthCheck {
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
impl Strategy for ForHealthCheck {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        // The state is the probe here, so guard on the same snapshot.
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval).unguarded();

        loop {
            poller.tick().await?;

            let state = poller.run(target.state()).await?.context(StateSnafu)?;
            check_state(&state)?;

            match state.health {
                Some(HealthStatus::Healthy) => return Ok(()),
                Some(status) => poller.not_ready(format!("health is {}", status)),
                None => poller.not_ready("container has no healthcheck status yet"),
            }
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn description(&self) -> String {
        "healthcheck".to_string()
    }
}
