//! The reconnection supervisor.
//!
//! Every attempt, scheduled or manual, goes through [`ReconnectSupervisor::attempt`]'s
//! exclusion discipline: a non-blocking try-acquire of a single in-flight
//! permit. An attempt that finds the permit taken is dropped on the spot, so
//! nobody ever waits for someone else's connect.

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::events::ReconnectEvent;
use crate::policy::FailureLogPolicy;
use crate::state::{ConnectionState, ConnectionStatus};
use crate::transport::Transport;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "supervisor_attempts_total",
            "Total number of connect attempts by outcome"
        );
        describe_counter!(
            "supervisor_warnings_total",
            "Total number of reconnect WARN heartbeats"
        );
        describe_counter!(
            "supervisor_escalations_total",
            "Total number of reconnect ERROR escalations"
        );
        describe_gauge!(
            "supervisor_connected",
            "Whether the supervised client is connected (1) or not (0)"
        );
    });
}

/// Result of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The transport connected.
    Connected,
    /// Already connected; nothing was attempted.
    AlreadyConnected,
    /// Another attempt was in flight; this one was dropped.
    InProgress,
    /// The transport failed to connect.
    Failed,
    /// The supervisor is closed; nothing was attempted.
    Closed,
}

/// RAII holder of the single in-flight slot.
struct AttemptPermit<'a> {
    in_flight: &'a AtomicBool,
    idle: &'a Notify,
}

impl Drop for AttemptPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

/// Owns a transport's connection state and drives reconnect attempts.
///
/// The supervisor never grows its retry period and never caps the number of
/// attempts; what it limits is how much those attempts log.
pub struct ReconnectSupervisor<T> {
    transport: T,
    config: SupervisorConfig,
    state: Mutex<ConnectionState>,
    status: AtomicU8,
    in_flight: AtomicBool,
    idle: Notify,
}

impl<T: Transport> ReconnectSupervisor<T> {
    /// Creates a disconnected supervisor. Nothing is attempted until
    /// [`attempt`](Self::attempt) is called or a [`Scheduler`](crate::Scheduler)
    /// is started for it.
    pub fn new(transport: T, config: SupervisorConfig) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();

        Self {
            transport,
            config,
            state: Mutex::new(ConnectionState::new()),
            status: AtomicU8::new(ConnectionStatus::Disconnected as u8),
            in_flight: AtomicBool::new(false),
            idle: Notify::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Returns the supervised transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Identifier of the remote endpoint.
    pub fn target(&self) -> &str {
        self.transport.target()
    }

    /// Returns the current status without locking.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Returns whether the supervisor is connected. Never blocks.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Returns whether a connect attempt is currently executing.
    pub fn is_attempt_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the full connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Runs one attempt on the scheduled path.
    ///
    /// Connect failures are absorbed here: they update the state and feed the
    /// log policy, and are reported only as [`AttemptOutcome::Failed`].
    pub async fn attempt(&self) -> AttemptOutcome {
        match self.run_attempt().await {
            Ok(outcome) => outcome,
            Err(_) => AttemptOutcome::Failed,
        }
    }

    /// Runs one attempt immediately, outside the schedule.
    ///
    /// Uses the same exclusion as scheduled attempts, so it returns
    /// [`AttemptOutcome::InProgress`] at once if another attempt is running.
    /// A connect failure updates state and logging exactly like a scheduled
    /// failure and is also returned to the caller.
    pub async fn manual_reconnect(&self) -> Result<AttemptOutcome, T::Error> {
        match self.run_attempt().await {
            Ok(AttemptOutcome::Closed) => Err(SupervisorError::Closed {
                target: self.target().to_string(),
            }),
            Ok(outcome) => Ok(outcome),
            Err(source) => Err(SupervisorError::Connect {
                target: self.target().to_string(),
                source,
            }),
        }
    }

    /// Marks an established connection as lost.
    ///
    /// Returns `false` if the supervisor was not connected. The next
    /// scheduled tick will start reconnecting.
    pub async fn connection_lost(&self) -> bool {
        let mut state = self.state.lock().await;
        if !state.mark_disconnected() {
            return false;
        }
        self.publish(&state);

        tracing::info!(
            supervisor = %self.config.name,
            "client lost connection to {}",
            self.target()
        );
        self.emit_transition(ConnectionStatus::Connected, ConnectionStatus::Disconnected);
        true
    }

    /// Closes the supervisor and releases the transport.
    ///
    /// Marks the state closed first, so no attempt, state change or log line
    /// can happen once this returns. An attempt still in flight is awaited
    /// for up to `timeout`; the transport close shares the same budget.
    /// Transport errors are logged at debug level and swallowed. Idempotent.
    pub async fn close(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        {
            let mut state = self.state.lock().await;
            let Some(previous) = state.close() else {
                return;
            };
            self.publish(&state);
            self.emit_transition(previous, ConnectionStatus::Closed);
        }

        if tokio::time::timeout_at(deadline, self.wait_idle())
            .await
            .is_err()
        {
            tracing::debug!(
                supervisor = %self.config.name,
                "connect attempt to {} still in flight after {:?}",
                self.target(),
                timeout
            );
        }

        match tokio::time::timeout_at(deadline, self.transport.close()).await {
            Ok(Ok(())) => {
                tracing::debug!(supervisor = %self.config.name, "closed client to {}", self.target());
            }
            Ok(Err(error)) => {
                tracing::debug!(
                    supervisor = %self.config.name,
                    error = %error,
                    "failed to close transport to {}",
                    self.target()
                );
            }
            Err(_) => {
                tracing::debug!(
                    supervisor = %self.config.name,
                    "closing transport to {} timed out",
                    self.target()
                );
            }
        }
    }

    async fn run_attempt(&self) -> std::result::Result<AttemptOutcome, T::Error> {
        if let Some(outcome) = self.skip_reason() {
            return Ok(outcome);
        }

        let Some(_permit) = self.try_acquire() else {
            self.attempt_dropped();
            return Ok(AttemptOutcome::InProgress);
        };

        // Whoever held the permit before us may have connected or closed.
        // Permit and status are both SeqCst: either close sees the permit
        // taken and waits, or this check sees Closed.
        if let Some(outcome) = self.skip_reason() {
            return Ok(outcome);
        }

        let result = self.transport.connect().await;

        let mut state = self.state.lock().await;
        if state.is_closed() {
            drop(state);
            if result.is_ok() {
                if let Err(error) = self.transport.close().await {
                    tracing::debug!(
                        supervisor = %self.config.name,
                        error = %error,
                        "failed to close transport to {} opened during close",
                        self.target()
                    );
                }
            }
            return Ok(AttemptOutcome::Closed);
        }

        match result {
            Ok(()) => {
                self.record_success(&mut state);
                Ok(AttemptOutcome::Connected)
            }
            Err(error) => {
                self.record_failure(&mut state, &error);
                Err(error)
            }
        }
    }

    fn skip_reason(&self) -> Option<AttemptOutcome> {
        match self.status() {
            ConnectionStatus::Connected => Some(AttemptOutcome::AlreadyConnected),
            ConnectionStatus::Closed => Some(AttemptOutcome::Closed),
            ConnectionStatus::Disconnected => None,
        }
    }

    fn try_acquire(&self) -> Option<AttemptPermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| AttemptPermit {
                in_flight: &self.in_flight,
                idle: &self.idle,
            })
    }

    async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.idle.notified());
            notified.as_mut().enable();
            if !self.in_flight.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn attempt_dropped(&self) {
        #[cfg(feature = "metrics")]
        counter!("supervisor_attempts_total", "supervisor" => self.config.name.clone(), "outcome" => "dropped")
            .increment(1);

        tracing::trace!(
            supervisor = %self.config.name,
            "connect attempt to {} already in flight, dropping",
            self.target()
        );

        // Best effort: skip the event rather than wait on the state lock
        if let Ok(state) = self.state.try_lock() {
            if !state.is_closed() {
                self.emit(ReconnectEvent::AttemptDropped {
                    name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
            }
        }
    }

    fn record_success(&self, state: &mut ConnectionState) {
        let from = state.status();
        let finished = state.mark_connected();
        self.publish(state);

        #[cfg(feature = "metrics")]
        counter!("supervisor_attempts_total", "supervisor" => self.config.name.clone(), "outcome" => "success")
            .increment(1);

        self.emit_transition(from, ConnectionStatus::Connected);

        match finished {
            Some(episode) => {
                let now = Instant::now();
                let downtime = episode.elapsed(now);
                let failures = episode.consecutive_failures();
                tracing::info!(
                    supervisor = %self.config.name,
                    failures,
                    downtime = ?downtime,
                    "client reconnect to {} succeeded after {} failed attempts",
                    self.target(),
                    failures
                );
                self.emit(ReconnectEvent::Recovered {
                    name: self.config.name.clone(),
                    timestamp: now,
                    failures,
                    downtime,
                });
            }
            None => {
                tracing::debug!(supervisor = %self.config.name, "connected to {}", self.target());
            }
        }
    }

    fn record_failure(&self, state: &mut ConnectionState, error: &T::Error) {
        let now = Instant::now();
        let from = state.status();
        let Some(episode) = state.record_failure(now) else {
            return;
        };

        let failures = episode.consecutive_failures();
        let elapsed = episode.elapsed(now);
        let verdict = self
            .config
            .policy
            .evaluate(failures, elapsed, episode.is_escalated());
        if verdict.escalate {
            episode.escalate();
        }
        self.publish(state);

        #[cfg(feature = "metrics")]
        counter!("supervisor_attempts_total", "supervisor" => self.config.name.clone(), "outcome" => "failure")
            .increment(1);

        self.emit_transition(from, ConnectionStatus::Disconnected);
        self.emit(ReconnectEvent::AttemptFailed {
            name: self.config.name.clone(),
            timestamp: now,
            consecutive_failures: failures,
            elapsed,
        });

        if verdict.warn {
            let message = FailureLogPolicy::warning_message(self.target(), failures);
            tracing::warn!(
                supervisor = %self.config.name,
                attempt = failures,
                error = %error,
                "{}",
                message
            );

            #[cfg(feature = "metrics")]
            counter!("supervisor_warnings_total", "supervisor" => self.config.name.clone())
                .increment(1);

            self.emit(ReconnectEvent::Warning {
                name: self.config.name.clone(),
                timestamp: now,
                consecutive_failures: failures,
                message,
            });
        } else {
            tracing::debug!(
                supervisor = %self.config.name,
                attempt = failures,
                error = %error,
                "connect attempt to {} failed",
                self.target()
            );
        }

        if verdict.escalate {
            let message = FailureLogPolicy::escalation_message(self.target(), elapsed);
            tracing::error!(
                supervisor = %self.config.name,
                attempt = failures,
                elapsed = ?elapsed,
                error = %error,
                "{}",
                message
            );

            #[cfg(feature = "metrics")]
            counter!("supervisor_escalations_total", "supervisor" => self.config.name.clone())
                .increment(1);

            self.emit(ReconnectEvent::Escalated {
                name: self.config.name.clone(),
                timestamp: now,
                elapsed,
                message,
            });
        }
    }

    /// Mirrors the status into the lock-free cell read by `is_connected`.
    fn publish(&self, state: &ConnectionState) {
        self.status.store(state.status() as u8, Ordering::SeqCst);

        #[cfg(feature = "metrics")]
        gauge!("supervisor_connected", "supervisor" => self.config.name.clone())
            .set(if state.is_connected() { 1.0 } else { 0.0 });
    }

    fn emit_transition(&self, from: ConnectionStatus, to: ConnectionStatus) {
        if from == to {
            return;
        }
        tracing::debug!(supervisor = %self.config.name, from = %from, to = %to, "connection state transition");
        self.emit(ReconnectEvent::StateTransition {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });
    }

    fn emit(&self, event: ReconnectEvent) {
        self.config.event_listeners.emit(&event);
    }
}

impl<T: Transport> std::fmt::Debug for ReconnectSupervisor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectSupervisor")
            .field("name", &self.config.name)
            .field("target", &self.target())
            .field("status", &self.status())
            .field("in_flight", &self.is_attempt_in_flight())
            .finish()
    }
}
