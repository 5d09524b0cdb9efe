//! Events emitted by the reconnection supervisor.
//!
//! Listeners are plain callbacks invoked synchronously while the supervisor
//! holds its state lock, so they must be cheap and must not call back into
//! the supervisor.

use crate::state::ConnectionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Events emitted by a [`ReconnectSupervisor`](crate::ReconnectSupervisor).
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// The connection status changed.
    StateTransition {
        name: String,
        timestamp: Instant,
        from: ConnectionStatus,
        to: ConnectionStatus,
    },
    /// A connect attempt failed.
    AttemptFailed {
        name: String,
        timestamp: Instant,
        consecutive_failures: u64,
        elapsed: Duration,
    },
    /// An attempt was skipped because another one was already in flight.
    AttemptDropped { name: String, timestamp: Instant },
    /// A WARN heartbeat was logged.
    Warning {
        name: String,
        timestamp: Instant,
        consecutive_failures: u64,
        message: String,
    },
    /// The one-shot ERROR escalation was logged for the current episode.
    Escalated {
        name: String,
        timestamp: Instant,
        elapsed: Duration,
        message: String,
    },
    /// A connect succeeded after a failure episode.
    Recovered {
        name: String,
        timestamp: Instant,
        failures: u64,
        downtime: Duration,
    },
}

impl ReconnectEvent {
    /// Short, stable name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::StateTransition { .. } => "state_transition",
            ReconnectEvent::AttemptFailed { .. } => "attempt_failed",
            ReconnectEvent::AttemptDropped { .. } => "attempt_dropped",
            ReconnectEvent::Warning { .. } => "warning",
            ReconnectEvent::Escalated { .. } => "escalated",
            ReconnectEvent::Recovered { .. } => "recovered",
        }
    }

    /// When the event occurred.
    pub fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::StateTransition { timestamp, .. }
            | ReconnectEvent::AttemptFailed { timestamp, .. }
            | ReconnectEvent::AttemptDropped { timestamp, .. }
            | ReconnectEvent::Warning { timestamp, .. }
            | ReconnectEvent::Escalated { timestamp, .. }
            | ReconnectEvent::Recovered { timestamp, .. } => *timestamp,
        }
    }

    /// Name of the supervisor that emitted the event.
    pub fn name(&self) -> &str {
        match self {
            ReconnectEvent::StateTransition { name, .. }
            | ReconnectEvent::AttemptFailed { name, .. }
            | ReconnectEvent::AttemptDropped { name, .. }
            | ReconnectEvent::Warning { name, .. }
            | ReconnectEvent::Escalated { name, .. }
            | ReconnectEvent::Recovered { name, .. } => name,
        }
    }
}

/// Receives supervisor events.
pub trait EventListener: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &ReconnectEvent);
}

/// A listener backed by a closure.
pub struct FnListener<F>
where
    F: Fn(&ReconnectEvent) + Send + Sync,
{
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&ReconnectEvent) + Send + Sync,
{
    /// Wraps a closure as a listener.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&ReconnectEvent) + Send + Sync,
{
    fn on_event(&self, event: &ReconnectEvent) {
        (self.f)(event)
    }
}

/// The set of listeners registered on a supervisor.
#[derive(Clone, Default)]
pub struct EventListeners {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventListeners {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener.
    ///
    /// A panicking listener is isolated; the rest still receive the event.
    pub fn emit(&self, event: &ReconnectEvent) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns true if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
