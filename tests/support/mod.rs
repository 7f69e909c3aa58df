// ABOUTME: Test support utilities.
// ABOUTME: Provides a scriptable StrategyTarget, log capture and a tiny HTTP server.

use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use container_wait::target::{
    ByteStream, ContainerStatus, ExecOptions, ExecOutput, InspectResult, PortBinding, PortMap,
    StrategyTarget, TargetError,
};
use container_wait::types::ContainerPort;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod docker;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("container_wait=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

type Handler<T> = Box<dyn Fn(usize) -> Result<T, TargetError> + Send + Sync>;
type PortHandler = Box<dyn Fn(ContainerPort, usize) -> Result<u16, TargetError> + Send + Sync>;
type ExecHandler =
    Box<dyn Fn(&[String], &ExecOptions, usize) -> Result<ExecOutput, TargetError> + Send + Sync>;
type CopyHandler = Box<dyn Fn(&str, usize) -> Result<Vec<u8>, TargetError> + Send + Sync>;

/// Number of calls made to each target operation.
#[derive(Debug, Default)]
pub struct Calls {
    pub state: AtomicUsize,
    pub inspect: AtomicUsize,
    pub mapped_port: AtomicUsize,
    pub logs: AtomicUsize,
    pub exec: AtomicUsize,
    pub copy: AtomicUsize,
}

#[allow(dead_code)]
pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::SeqCst)
}

/// StrategyTarget whose every operation is a closure over the call index.
///
/// Defaults: running, no ports, empty logs, exec exits 0, files not found.
pub struct MockTarget {
    host: String,
    state: Handler<ContainerStatus>,
    inspect: Handler<InspectResult>,
    mapped_port: PortHandler,
    logs: Handler<Vec<u8>>,
    exec: ExecHandler,
    copy: CopyHandler,
    pub calls: Calls,
}

#[allow(dead_code)]
impl MockTarget {
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            state: Box::new(|_| Ok(ContainerStatus::running())),
            inspect: Box::new(|_| Ok(InspectResult::default())),
            mapped_port: Box::new(|port, _| Err(TargetError::PortNotFound(port))),
            logs: Box::new(|_| Ok(Vec::new())),
            exec: Box::new(|_, _, _| Ok(ExecOutput::new(0))),
            copy: Box::new(|path, _| Err(TargetError::NotFound(path.to_string()))),
            calls: Calls::default(),
        }
    }

    /// A container that was OOM-killed.
    pub fn oom_killed() -> Self {
        Self::new().with_status(ContainerStatus {
            oom_killed: true,
            status: "exited".to_string(),
            exit_code: 137,
            ..Default::default()
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_status(self, status: ContainerStatus) -> Self {
        self.with_state(move |_| Ok(status.clone()))
    }

    pub fn with_state<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Result<ContainerStatus, TargetError> + Send + Sync + 'static,
    {
        self.state = Box::new(f);
        self
    }

    pub fn with_inspect<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Result<InspectResult, TargetError> + Send + Sync + 'static,
    {
        self.inspect = Box::new(f);
        self
    }

    /// Inspect always returns these ports.
    pub fn with_ports(self, ports: PortMap) -> Self {
        self.with_inspect(move |_| {
            Ok(InspectResult {
                ports: ports.clone(),
                ..Default::default()
            })
        })
    }

    pub fn with_mapped_port<F>(mut self, f: F) -> Self
    where
        F: Fn(ContainerPort, usize) -> Result<u16, TargetError> + Send + Sync + 'static,
    {
        self.mapped_port = Box::new(f);
        self
    }

    /// Every container port maps to `host_port`.
    pub fn with_fixed_mapping(self, host_port: u16) -> Self {
        self.with_mapped_port(move |_, _| Ok(host_port))
    }

    pub fn with_logs<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Result<Vec<u8>, TargetError> + Send + Sync + 'static,
    {
        self.logs = Box::new(f);
        self
    }

    pub fn with_exec<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String], &ExecOptions, usize) -> Result<ExecOutput, TargetError>
            + Send
            + Sync
            + 'static,
    {
        self.exec = Box::new(f);
        self
    }

    pub fn with_copy<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Vec<u8>, TargetError> + Send + Sync + 'static,
    {
        self.copy = Box::new(f);
        self
    }
}

#[async_trait]
impl StrategyTarget for MockTarget {
    async fn host(&self) -> Result<String, TargetError> {
        Ok(self.host.clone())
    }

    async fn inspect(&self) -> Result<InspectResult, TargetError> {
        (self.inspect)(bump(&self.calls.inspect))
    }

    async fn mapped_port(&self, port: ContainerPort) -> Result<u16, TargetError> {
        (self.mapped_port)(port, bump(&self.calls.mapped_port))
    }

    async fn logs(&self) -> Result<ByteStream, TargetError> {
        let bytes = (self.logs)(bump(&self.calls.logs))?;
        Ok(Box::pin(Cursor::new(bytes)))
    }

    async fn exec(&self, cmd: &[String], options: &ExecOptions) -> Result<ExecOutput, TargetError> {
        (self.exec)(cmd, options, bump(&self.calls.exec))
    }

    async fn state(&self) -> Result<ContainerStatus, TargetError> {
        (self.state)(bump(&self.calls.state))
    }

    async fn copy_from_container(&self, path: &str) -> Result<ByteStream, TargetError> {
        let bytes = (self.copy)(path, bump(&self.calls.copy))?;
        Ok(Box::pin(Cursor::new(bytes)))
    }
}

/// Port map with one binding per `(container, host)` pair.
#[allow(dead_code)]
pub fn ports(bindings: &[(&str, Option<u16>)]) -> PortMap {
    let mut map = PortMap::new();
    for (port, host_port) in bindings {
        let entry = map.entry(ContainerPort::parse(port).unwrap()).or_default();
        if let Some(host_port) = host_port {
            entry.push(PortBinding {
                host_ip: "0.0.0.0".to_string(),
                host_port: *host_port,
            });
        }
    }
    map
}

/// Collects formatted tracing output for assertions.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl CapturedLogs {
    /// Install a thread-local subscriber writing into the returned buffer.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Answer every connection with `status` and `body`; returns the port.
#[allow(dead_code)]
pub async fn serve_http(status: u16, body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    port
}

/// A local port nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
