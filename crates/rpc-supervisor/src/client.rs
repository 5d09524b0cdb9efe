//! The client facade handed to callers.

use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::state::ConnectionState;
use crate::supervisor::ReconnectSupervisor;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long a client that failed its `check` gets to release the transport.
pub const CHECK_CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// A persistent client connection that reconnects on its own.
///
/// # Examples
///
/// ```rust,no_run
/// use rpc_supervisor::{Client, SupervisorConfig, TcpTransport};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SupervisorConfig::builder()
///     .name("registry")
///     .period(Duration::from_millis(200))
///     .build();
///
/// // Returns even if the endpoint is down; retries run in the background
/// let client = Client::connect(TcpTransport::new("127.0.0.1:20880"), config).await?;
///
/// if !client.is_connected() {
///     // Try right now instead of waiting for the next tick
///     let _ = client.reconnect().await;
/// }
///
/// client.close(Duration::from_secs(2)).await;
/// # Ok(())
/// # }
/// ```
pub struct Client<T> {
    supervisor: Arc<ReconnectSupervisor<T>>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl<T: Transport> Client<T> {
    /// Creates the client and starts its reconnect scheduler.
    ///
    /// With `initial_connect` enabled (the default) one attempt is made before
    /// returning. Its failure is only returned when `check` is enabled, in
    /// which case the client is closed again; otherwise the client comes back
    /// disconnected and keeps retrying every `period`.
    pub async fn connect(transport: T, config: SupervisorConfig) -> Result<Self, T::Error> {
        let initial_connect = config.initial_connect();
        let check = config.check();
        let supervisor = Arc::new(ReconnectSupervisor::new(transport, config));

        if initial_connect {
            if let Err(error) = supervisor.manual_reconnect().await {
                if check {
                    supervisor.close(CHECK_CLOSE_TIMEOUT).await;
                    return Err(error);
                }
            }
        }

        let scheduler = Scheduler::start(Arc::clone(&supervisor));
        Ok(Self {
            supervisor,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    /// Returns whether the client is connected. Never blocks.
    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    /// Attempts to connect right now.
    ///
    /// Returns `Ok(())` if connected afterwards or if another attempt was
    /// already running. A connect failure is returned as
    /// [`SupervisorError::Connect`](crate::SupervisorError::Connect) and is
    /// also counted and logged like a scheduled failure. The schedule is not
    /// affected.
    pub async fn reconnect(&self) -> Result<(), T::Error> {
        self.supervisor.manual_reconnect().await.map(|_| ())
    }

    /// Stops reconnecting and releases the transport within `timeout`.
    ///
    /// Never fails; repeated calls are no-ops.
    pub async fn close(&self, timeout: Duration) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop();
        }
        self.supervisor.close(timeout).await;
    }

    /// Returns a snapshot of the connection state.
    pub async fn state(&self) -> ConnectionState {
        self.supervisor.state().await
    }

    /// Returns the underlying supervisor.
    pub fn supervisor(&self) -> &ReconnectSupervisor<T> {
        &self.supervisor
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        self.supervisor.transport()
    }
}

impl<T> Drop for Client<T> {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.try_lock().ok().and_then(|mut s| s.take()) {
            scheduler.stop();
        }
    }
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("supervisor", &self.supervisor)
            .finish()
    }
}
