// ABOUTME: Wait strategy that pings a database through a mapped container port.
// ABOUTME: The database client is supplied by the caller through the SqlDriver trait.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;

use super::context::WaitContext;
use super::error::{TargetSnafu, WaitError};
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::StrategyTarget;
use crate::types::ContainerPort;

/// Boxed error returned by database drivers.
pub type SqlError = Box<dyn std::error::Error + Send + Sync>;

/// Opens connections for [`ForSql`].
///
/// Implement this over whichever database client the application already
/// uses; the strategy only needs to connect and run one statement.
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Driver name, used in diagnostics.
    fn name(&self) -> &str;

    /// Open a connection for the given connection string.
    async fn connect(&self, url: &str) -> Result<Box<dyn SqlConnection>, SqlError>;
}

/// An open database connection.
#[async_trait]
pub trait SqlConnection: Send {
    /// Execute `query`, discarding any rows.
    async fn execute(&mut self, query: &str) -> Result<(), SqlError>;
}

pub const DEFAULT_SQL_QUERY: &str = "SELECT 1";

type UrlBuilder = Arc<dyn Fn(&str, u16) -> String + Send + Sync>;

/// Waits until a query succeeds against the database in the container.
#[derive(Clone)]
pub struct ForSql {
    port: ContainerPort,
    driver: Arc<dyn SqlDriver>,
    url: UrlBuilder,
    query: String,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForSql {
    /// `url` turns the engine host and mapped port into a connection string.
    pub fn new<F>(port: ContainerPort, driver: Arc<dyn SqlDriver>, url: F) -> Self
    where
        F: Fn(&str, u16) -> String + Send + Sync + 'static,
    {
        Self {
            port,
            driver,
            url: Arc::new(url),
            query: DEFAULT_SQL_QUERY.to_string(),
            timeout: None,
            poll: PollConfig::default(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
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

impl fmt::Debug for ForSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForSql")
            .field("port", &self.port)
            .field("driver", &self.driver.name())
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .field("poll", &self.poll)
            .finish()
    }
}

impl fmt::Display for ForSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SQL database on port {} using driver {:?}",
            self.port,
            self.driver.name()
        )?;
        if self.query != DEFAULT_SQL_QUERY {
            write!(f, " with query {:?}", self.query)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Strategy for ForSql {
    async fn wait_until_ready(
        &self,
        ctx: &WaitContext,
        target: &dyn StrategyTarget,
    ) -> Result<(), WaitError> {
        let timeout = self.timeout.unwrap_or(self.poll.timeout);
        let mut poller = Poller::new(ctx, target, timeout, self.poll.poll_interval);

        let host = poller
            .run(target.host())
            .await?
            .context(TargetSnafu { operation: "host" })?;

        let mut url: Option<String> = None;
        let mut connection: Option<Box<dyn SqlConnection>> = None;

        loop {
            poller.tick().await?;

            if url.is_none() {
                match poller.run(target.mapped_port(self.port)).await? {
                    Ok(mapped) => url = Some((self.url)(&host, mapped)),
                    Err(e) if e.is_port_not_found() => {
                        poller.not_ready(e);
                        continue;
                    }
                    Err(source) => {
                        return Err(WaitError::Target {
                            operation: "mapped port",
                            source,
                        });
                    }
                }
            }
            let Some(url) = url.as_deref() else { continue };

            if connection.is_none() {
                match poller.run(self.driver.connect(url)).await? {
                    Ok(conn) => connection = Some(conn),
                    Err(e) => {
                        poller.not_ready(format!("{} connect: {}", self.driver.name(), e));
                        continue;
                    }
                }
            }
            let Some(conn) = connection.as_mut() else { continue };

            match poller.run(conn.execute(&self.query)).await? {
                Ok(()) => return Ok(()),
                Err(e) => {
                    poller.not_ready(format!("{} query: {}", self.driver.name(), e));
                    connection = None;
                }
            }
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn description(&self) -> String {
        self.to_string()
    }
}
