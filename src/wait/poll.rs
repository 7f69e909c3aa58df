// ABOUTME: Shared polling machinery: defaults, the per-tick state guard and the Poller loop driver.
// ABOUTME: Every leaf strategy runs guard-then-probe ticks through a Poller.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use snafu::ResultExt;

use super::context::{DoneReason, WaitContext};
use super::error::{StateSnafu, WaitError};
use crate::target::{ContainerStatus, StrategyTarget};

/// Timeout and poll interval a strategy falls back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl PollConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// Map a container state onto the guard outcome.
pub fn check_state(state: &ContainerStatus) -> Result<(), WaitError> {
    if state.running {
        Ok(())
    } else if state.oom_killed {
        Err(WaitError::ContainerOomKilled)
    } else if state.status == "exited" {
        Err(WaitError::ContainerExited {
            exit_code: state.exit_code,
        })
    } else {
        Err(WaitError::UnexpectedStatus {
            status: state.status.clone(),
        })
    }
}

/// Fetch the container state and fail on anything but running.
pub async fn check_target(target: &dyn StrategyTarget) -> Result<(), WaitError> {
    let state = target.state().await.context(StateSnafu)?;
    check_state(&state)
}

/// Drives the tick loop of one `wait_until_ready` call.
///
/// Owns the strategy's context and remembers the most recent not-ready
/// reason so a timeout can report it.
pub(crate) struct Poller<'a> {
    ctx: WaitContext,
    target: &'a dyn StrategyTarget,
    interval: Duration,
    guarded: bool,
    ticks: u64,
    last: Option<String>,
}

impl<'a> Poller<'a> {
    /// Poller whose deadline is the earlier of `ctx`'s and `now + timeout`.
    pub(crate) fn new(
        ctx: &WaitContext,
        target: &'a dyn StrategyTarget,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            ctx: ctx.with_timeout(timeout),
            target,
            interval,
            guarded: true,
            ticks: 0,
            last: None,
        }
    }

    /// Skip the container-state guard; for strategies that wait on the state itself.
    pub(crate) fn unguarded(mut self) -> Self {
        self.guarded = false;
        self
    }

    pub(crate) fn target(&self) -> &'a dyn StrategyTarget {
        self.target
    }

    /// Start the next tick: sleep (except before the first), honour the
    /// deadline, then run the state guard.
    pub(crate) async fn tick(&mut self) -> Result<(), WaitError> {
        if self.ticks > 0 {
            if let Err(reason) = self.ctx.sleep(self.interval).await {
                return Err(self.expired(reason));
            }
        }
        self.ticks += 1;

        if let Some(reason) = self.ctx.done_reason() {
            return Err(self.expired(reason));
        }

        if self.guarded {
            let target = self.target;
            self.run(check_target(target)).await??;
        }

        tracing::trace!(tick = self.ticks, "polling");
        Ok(())
    }

    /// Run a probe step, aborting with a timeout if the context finishes first.
    pub(crate) async fn run<F: Future>(&mut self, fut: F) -> Result<F::Output, WaitError> {
        match self.ctx.run(fut).await {
            Ok(output) => Ok(output),
            Err(reason) => Err(self.expired(reason)),
        }
    }

    /// Record why this tick did not succeed.
    pub(crate) fn not_ready(&mut self, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        tracing::debug!(tick = self.ticks, %reason, "not ready");
        self.last = Some(reason);
    }

    fn expired(&mut self, reason: DoneReason) -> WaitError {
        WaitError::Timeout {
            reason,
            last: self.last.take(),
        }
    }
}
