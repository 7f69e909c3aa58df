// ABOUTME: Wait strategy that polls an HTTP endpoint on a mapped container port.
// ABOUTME: Uses a hyper HTTP/1.1 client connection per request over plain TCP.

use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use snafu::ResultExt;
use tokio::net::TcpStream;

use super::context::WaitContext;
use super::error::{TargetSnafu, WaitError};
use super::poll::{PollConfig, Poller};
use super::Strategy;
use crate::target::StrategyTarget;
use crate::types::ContainerPort;

type StatusMatcher = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;
type BodyMatcher = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Waits for an HTTP endpoint to answer with an accepted response.
#[derive(Clone)]
pub struct ForHttp {
    path: String,
    port: Option<ContainerPort>,
    method: Method,
    headers: Vec<(String, String)>,
    body: Bytes,
    status_matcher: StatusMatcher,
    body_matcher: Option<BodyMatcher>,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl ForHttp {
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        Self {
            path,
            port: None,
            method: Method::GET,
            headers: Vec::new(),
            body: Bytes::new(),
            status_matcher: Arc::new(|status| status.is_success()),
            body_matcher: None,
            timeout: None,
            poll: PollConfig::default(),
        }
    }

    /// Probe this container port instead of auto-selecting one.
    pub fn with_port(mut self, port: ContainerPort) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Accept exactly this status.
    pub fn with_status(self, status: u16) -> Self {
        self.with_status_code_matcher(move |actual| actual.as_u16() == status)
    }

    pub fn with_status_code_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.status_matcher = Arc::new(matcher);
        self
    }

    pub fn with_response_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.body_matcher = Some(Arc::new(matcher));
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

impl fmt::Debug for ForHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForHttp")
            .field("path", &self.path)
            .field("port", &self.port)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("has_body_matcher", &self.body_matcher.is_some())
            .field("timeout", &self.timeout)
            .field("poll", &self.poll)
            .finish()
    }
}

impl fmt::Display for ForHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.method, self.path)?;
        if let Some(port) = self.port {
            write!(f, " on port {}", port)?;
        }
        Ok(())
    }
}

/// Outcome of one request that reached the server or clearly could not.
enum Attempt {
    Response { status: StatusCode, body: Bytes },
    Unreachable(String),
}

fn is_unreachable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::TimedOut
            | ErrorKind::AddrNotAvailable
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

/// Walk the error chain looking for an I/O error that means "not up yet".
fn io_kind(err: &(dyn std::error::Error + 'static)) -> Option<ErrorKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = e.source();
    }
    None
}

impl ForHttp {
    async fn send(&self, host: &str, port: u16) -> Result<Attempt, WaitError> {
        let stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(e) if is_unreachable(e.kind()) => {
                return Ok(Attempt::Unreachable(format!("{}:{}: {}", host, port, e)));
            }
            Err(e) => {
                return Err(WaitError::Http {
                    message: format!("connect {}:{}: {}", host, port, e),
                });
            }
        };

        let io = TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(parts) => parts,
            Err(e) if e.is_closed() || io_kind(&e).is_some_and(is_unreachable) => {
                return Ok(Attempt::Unreachable(format!("handshake: {}", e)));
            }
            Err(e) => {
                return Err(WaitError::Http {
                    message: format!("handshake: {}", e),
                });
            }
        };

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("http probe connection error: {}", e);
            }
        });

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.path.as_str())
            .header(hyper::header::HOST, format!("{}:{}", host, port));
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request = request
            .body(Full::new(self.body.clone()))
            .map_err(|e| WaitError::InvalidConfig {
                message: format!("http request: {}", e),
            })?;

        let response = match sender.send_request(request).await {
            Ok(response) => response,
            Err(e)
                if e.is_closed()
                    || e.is_incomplete_message()
                    || io_kind(&e).is_some_and(is_unreachable) =>
            {
                return Ok(Attempt::Unreachable(format!("request: {}", e)));
            }
            Err(e) => {
                return Err(WaitError::Http {
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return Ok(Attempt::Unreachable(format!("read body: {}", e))),
        };

        Ok(Attempt::Response { status, body })
    }

    async fn resolve_port(&self, poller: &mut Poller<'_>) -> Result<Option<u16>, WaitError> {
        let target = poller.target();

        let port = match self.port {
            Some(port) => port,
            None => {
                let inspect = poller
                    .run(target.inspect())
                    .await?
                    .context(TargetSnafu { operation: "inspect" })?;
                inspect
                    .bound_tcp_ports()
                    .next()
                    .ok_or(WaitError::NoExposedPorts)?
            }
        };

        match poller.run(target.mapped_port(port)).await? {
            Ok(mapped) => Ok(Some(mapped)),
            Err(e) if e.is_port_not_found() => {
                poller.not_ready(e);
                Ok(None)
            }
            Err(source) => Err(WaitError::Target {
                operation: "mapped port",
                source,
            }),
        }
    }
}

#[async_trait]
impl Strategy for ForHttp {
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

        let mut mapped = None;
        loop {
            poller.tick().await?;

            let port = match mapped {
                Some(port) => port,
                None => match self.resolve_port(&mut poller).await? {
                    Some(port) => {
                        mapped = Some(port);
                        port
                    }
                    None => continue,
                },
            };

            match poller.run(self.send(&host, port)).await?? {
                Attempt::Unreachable(reason) => poller.not_ready(reason),
                Attempt::Response { status, .. } if !(self.status_matcher)(status) => {
                    poller.not_ready(format!("unexpected status {}", status));
                }
                Attempt::Response { body, .. } => match &self.body_matcher {
                    Some(matcher) if !matcher(&body) => {
                        poller.not_ready("response body did not match");
                    }
                    _ => {
                        tracing::debug!(strategy = %self, port, "endpoint ready");
                        return Ok(());
                    }
                },
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
