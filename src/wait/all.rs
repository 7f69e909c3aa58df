// ABOUTME: Composite strategy that runs child strategies in order, failing on the first error.
// ABOUTME: Supports an overall deadline and a default timeout for children that set none.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::context::WaitContext;
use super::error::WaitError;
use super::Strategy;
use crate::target::StrategyTarget;

/// Runs every child strategy sequentially.
#[derive(Default)]
pub struct ForAll {
    strategies: Vec<Box<dyn Strategy>>,
    deadline: Option<Duration>,
    default_timeout: Option<Duration>,
}

impl ForAll {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            strategies,
            deadline: None,
            default_timeout: None,
        }
    }

    /// Append a child strategy.
    pub fn with<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Append a child strategy if there is one.
    pub fn with_optional<S: Strategy + 'static>(self, strategy: Option<S>) -> Self {
        match strategy {
            Some(strategy) => self.with(strategy),
            None => self,
        }
    }

    /// Bound the wall-clock time of the whole sequence.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Timeout applied to children that do not configure their own.
    pub fn with_startup_timeout_default(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl fmt::Debug for ForAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children: Vec<String> = self.strategies.iter().map(|s| s.description()).collect();
        f.debug_struct("ForAll")
            .field("strategies", &children)
            .field("deadline", &self.deadline)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl fmt::Display for ForAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all of:")?;
        for (i, strategy) in self.strategies.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, strategy.description())?;
        }
        Ok(())
    }
}

#[async_trait]
impl Strategy for ForAll {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        if self.strategies.is_empty() {
            return Err(WaitError::NoStrategySupplied);
        }

        let ctx = match self.deadline {
            Some(deadline) => ctx.with_timeout(deadline),
            None => ctx.clone(),
        };

        for strategy in &self.strategies {
            let child_ctx = match (self.default_timeout, strategy.timeout()) {
                (Some(default), None) => ctx.with_timeout(default),
                _ => ctx.clone(),
            };

            tracing::debug!(strategy = %strategy.description(), "waiting");
            strategy.wait_until_ready(&child_ctx, target).await?;
        }

        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    fn description(&self) -> String {
        self.to_string()
    }
}
