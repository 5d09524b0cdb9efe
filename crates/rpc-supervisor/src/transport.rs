//! Transports: the connection primitive the supervisor drives.

use std::fmt::Display;
use std::future::Future;
use std::io;
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tower::{Service, ServiceExt};

/// A connection that can be established and torn down.
///
/// The supervisor guarantees that at most one `connect` call is in flight at
/// a time, so implementations only need interior mutability to store the
/// established connection.
///
/// # Examples
///
/// ```rust
/// use rpc_supervisor::Transport;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Loopback {
///     up: AtomicBool,
/// }
///
/// impl Transport for Loopback {
///     type Error = std::io::Error;
///
///     fn target(&self) -> &str {
///         "loopback"
///     }
///
///     async fn connect(&self) -> Result<(), Self::Error> {
///         self.up.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     async fn close(&self) -> Result<(), Self::Error> {
///         self.up.store(false, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn is_connected(&self) -> bool {
///         self.up.load(Ordering::SeqCst)
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Error returned by a failed connect or close.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Identifier of the remote endpoint, used in log messages.
    fn target(&self) -> &str;

    /// Establishes the connection.
    fn connect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Releases the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Probes whether an established connection is still usable.
    ///
    /// Consulted by the scheduler while the supervisor believes it is
    /// connected. Must not block. The default never reports a loss.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// A plain TCP transport.
#[derive(Debug)]
pub struct TcpTransport {
    target: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    /// Creates a transport for `host:port`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: Mutex::new(None),
        }
    }

    /// Sets the connect timeout.
    ///
    /// Default: 3 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Locks the current stream, if connected.
    pub async fn stream(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.stream.lock().await
    }
}

impl Transport for TcpTransport {
    type Error = io::Error;

    fn target(&self) -> &str {
        &self.target
    }

    async fn connect(&self) -> Result<(), Self::Error> {
        let stream =
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.target.as_str()))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!(
                            "connect to {} timed out after {:?}",
                            self.target, self.connect_timeout
                        ),
                    )
                })??;
        stream.set_nodelay(true)?;

        let previous = self.stream.lock().await.replace(stream);
        drop(previous);
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let stream = self.stream.lock().await.take();
        if let Some(mut stream) = stream {
            stream.shutdown().await?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // A locked stream is in use, which only happens while it exists
        let Ok(mut guard) = self.stream.try_lock() else {
            return true;
        };
        let Some(stream) = guard.as_ref() else {
            return false;
        };
        if peer_alive(stream) {
            return true;
        }
        tracing::debug!("peer {} closed the connection", self.target);
        *guard = None;
        false
    }
}

/// Peeks one byte without waiting. EOF or a socket error means the peer is
/// gone; pending or buffered data means it is still there.
fn peer_alive(stream: &TcpStream) -> bool {
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    let mut cx = Context::from_waker(Waker::noop());
    match stream.poll_peek(&mut cx, &mut buf) {
        Poll::Ready(Ok(0)) | Poll::Ready(Err(_)) => false,
        Poll::Ready(Ok(_)) | Poll::Pending => true,
    }
}

/// A transport backed by a tower connector service.
///
/// Any `Service<Target>` whose response is a connection works, for example
/// a `tower::service_fn` around `TcpStream::connect` or a hyper connector.
/// The produced connection is kept until [`Transport::close`].
pub struct ServiceTransport<S, Tgt>
where
    S: Service<Tgt>,
{
    connector: Mutex<S>,
    target: Tgt,
    label: String,
    connection: Mutex<Option<S::Response>>,
}

impl<S, Tgt> ServiceTransport<S, Tgt>
where
    S: Service<Tgt>,
    Tgt: Display,
{
    /// Wraps `connector`, which will be called with `target` on every attempt.
    pub fn new(connector: S, target: Tgt) -> Self {
        let label = target.to_string();
        Self {
            connector: Mutex::new(connector),
            target,
            label,
            connection: Mutex::new(None),
        }
    }

    /// Locks the current connection, if any.
    pub async fn connection(&self) -> MutexGuard<'_, Option<S::Response>> {
        self.connection.lock().await
    }
}

impl<S, Tgt> Transport for ServiceTransport<S, Tgt>
where
    S: Service<Tgt> + Send + 'static,
    S::Future: Send,
    S::Response: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    Tgt: Clone + Send + Sync + 'static,
{
    type Error = S::Error;

    fn target(&self) -> &str {
        &self.label
    }

    async fn connect(&self) -> Result<(), Self::Error> {
        let connection = {
            let mut connector = self.connector.lock().await;
            connector.ready().await?.call(self.target.clone()).await?
        };
        let previous = self.connection.lock().await.replace(connection);
        drop(previous);
        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let connection = self.connection.lock().await.take();
        drop(connection);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection
            .try_lock()
            .map(|connection| connection.is_some())
            .unwrap_or(true)
    }
}

impl<S, Tgt> std::fmt::Debug for ServiceTransport<S, Tgt>
where
    S: Service<Tgt>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTransport")
            .field("target", &self.label)
            .finish()
    }
}
