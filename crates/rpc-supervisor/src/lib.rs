//! Reconnection supervisor for persistent RPC client connections.
//!
//! A [`Client`] holds a connection to a remote endpoint that may be down for
//! seconds or for hours. Behind it a [`ReconnectSupervisor`] retries on a
//! fixed period and turns the resulting stream of failures into a bounded
//! log signal.
//!
//! # Features
//!
//! - **Fixed-period retries**: a [`Scheduler`] fires one attempt per `period`,
//!   forever, until the client connects or is closed. No backoff.
//! - **Single attempt in flight**: scheduled and manual attempts share one
//!   non-blocking permit; an attempt that finds it taken is dropped, never queued.
//! - **Rate-limited heartbeats**: a WARN every `warning_every` consecutive
//!   failures (`client reconnect to <target>, attempt #<n>`).
//! - **One-shot escalation**: one ERROR per outage once it has lasted longer
//!   than `shutdown_timeout`.
//! - **Event system**: callbacks for warnings, escalations, state changes.
//! - **Metrics**: optional `metrics` feature.
//!
//! # Examples
//!
//! ```rust
//! use rpc_supervisor::{Client, SupervisorConfig, TcpTransport};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = SupervisorConfig::builder()
//!     .name("provider")
//!     .period(Duration::from_millis(200))
//!     .warning_every(10)
//!     .shutdown_timeout(Duration::from_secs(60))
//!     .build();
//!
//! let transport = TcpTransport::new("127.0.0.1:1").connect_timeout(Duration::from_millis(50));
//! let client = Client::connect(transport, config).await.unwrap();
//!
//! // Nobody listens on port 1
//! assert!(!client.is_connected());
//! assert!(client.reconnect().await.is_err());
//!
//! client.close(Duration::from_secs(1)).await;
//! # }
//! ```

mod client;
mod config;
mod error;
mod events;
mod policy;
mod scheduler;
mod state;
mod supervisor;
mod transport;

pub use client::{Client, CHECK_CLOSE_TIMEOUT};
pub use config::{
    SupervisorConfig, SupervisorConfigBuilder, DEFAULT_PERIOD, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use error::{Result, SupervisorError};
pub use events::{EventListener, EventListeners, FnListener, ReconnectEvent};
pub use policy::{FailureLogPolicy, FailureVerdict, LOG_PREFIX};
pub use scheduler::Scheduler;
pub use state::{ConnectionState, ConnectionStatus, FailureEpisode};
pub use supervisor::{AttemptOutcome, ReconnectSupervisor};
pub use transport::{ServiceTransport, TcpTransport, Transport, DEFAULT_CONNECT_TIMEOUT};
