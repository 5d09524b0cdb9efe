//! Configuration for the reconnection supervisor.

use crate::events::{EventListeners, FnListener, ReconnectEvent};
use crate::policy::FailureLogPolicy;
use crate::state::ConnectionStatus;
use std::time::Duration;

/// Default retry period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(2);

/// Default episode length before the ERROR escalation fires.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Configuration for a [`ReconnectSupervisor`](crate::ReconnectSupervisor).
#[derive(Clone)]
pub struct SupervisorConfig {
    /// Name of this supervisor instance, used in logs, events and metrics.
    pub(crate) name: String,

    /// Fixed delay between scheduled attempts.
    pub(crate) period: Duration,

    /// Log policy derived from `warning_every` and `shutdown_timeout`.
    pub(crate) policy: FailureLogPolicy,

    /// Connect once while constructing the client.
    pub(crate) initial_connect: bool,

    /// Fail construction if the initial connect fails.
    pub(crate) check: bool,

    pub(crate) event_listeners: EventListeners,
}

impl SupervisorConfig {
    /// Creates a new builder for configuring a supervisor.
    pub fn builder() -> SupervisorConfigBuilder {
        #[cfg(feature = "metrics")]
        crate::supervisor::describe_metrics();
        SupervisorConfigBuilder::default()
    }

    /// Returns the instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the retry period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns how often consecutive failures produce a WARN.
    pub fn warning_every(&self) -> u64 {
        self.policy.warning_every()
    }

    /// Returns the episode length after which failures escalate to ERROR.
    pub fn shutdown_timeout(&self) -> Duration {
        self.policy.shutdown_timeout()
    }

    /// Returns the failure log policy.
    pub fn policy(&self) -> &FailureLogPolicy {
        &self.policy
    }

    /// Returns whether the client connects once during construction.
    pub fn initial_connect(&self) -> bool {
        self.initial_connect
    }

    /// Returns whether a failed initial connect fails construction.
    pub fn check(&self) -> bool {
        self.check
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfigBuilder::default().build()
    }
}

impl std::fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("warning_every", &self.policy.warning_every())
            .field("shutdown_timeout", &self.policy.shutdown_timeout())
            .field("initial_connect", &self.initial_connect)
            .field("check", &self.check)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`SupervisorConfig`].
pub struct SupervisorConfigBuilder {
    name: String,
    period: Duration,
    warning_every: u64,
    shutdown_timeout: Duration,
    initial_connect: bool,
    check: bool,
    event_listeners: EventListeners,
}

impl SupervisorConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of this supervisor instance.
    ///
    /// Default: "supervisor"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the fixed period between scheduled reconnect attempts.
    ///
    /// The period is never grown; there is no backoff.
    ///
    /// Default: 2 seconds
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn period(mut self, period: Duration) -> Self {
        assert!(!period.is_zero(), "period must be greater than zero");
        self.period = period;
        self
    }

    /// Emit a WARN only on every `n`-th consecutive failure.
    ///
    /// Default: 1 (every failure warns)
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpc_supervisor::SupervisorConfig;
    /// use std::time::Duration;
    ///
    /// // 1ms retries, but only one heartbeat per 100 failures
    /// let config = SupervisorConfig::builder()
    ///     .period(Duration::from_millis(1))
    ///     .warning_every(100)
    ///     .build();
    /// assert_eq!(config.warning_every(), 100);
    /// ```
    pub fn warning_every(mut self, n: u64) -> Self {
        assert!(n > 0, "warning_every must be at least 1");
        self.warning_every = n;
        self
    }

    /// Sets how long a failure episode may last before one ERROR is logged.
    ///
    /// Default: 15 minutes
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets whether the client attempts one connect while being constructed.
    ///
    /// Default: true
    pub fn initial_connect(mut self, enabled: bool) -> Self {
        self.initial_connect = enabled;
        self
    }

    /// Sets whether a failed initial connect makes construction fail.
    ///
    /// With `false` the client is returned disconnected and the scheduler
    /// keeps retrying in the background.
    ///
    /// Default: false
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Registers a callback for every WARN heartbeat.
    ///
    /// # Callback Signature
    /// `Fn(u64)` - Called with the consecutive failure count that triggered the warning.
    ///
    /// # Example
    /// ```rust
    /// use rpc_supervisor::SupervisorConfig;
    /// use std::sync::atomic::{AtomicU64, Ordering};
    /// use std::sync::Arc;
    ///
    /// let warnings = Arc::new(AtomicU64::new(0));
    /// let counter = Arc::clone(&warnings);
    ///
    /// let config = SupervisorConfig::builder()
    ///     .on_warning(move |attempt| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         println!("still retrying, attempt #{}", attempt);
    ///     })
    ///     .build();
    /// ```
    pub fn on_warning<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Warning {
                consecutive_failures,
                ..
            } = event
            {
                f(*consecutive_failures);
            }
        }));
        self
    }

    /// Registers a callback for the one-shot ERROR escalation.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with how long the episode had been failing.
    pub fn on_escalation<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Escalated { elapsed, .. } = event {
                f(*elapsed);
            }
        }));
        self
    }

    /// Registers a callback for every failed connect attempt.
    ///
    /// # Callback Signature
    /// `Fn(u64)` - Called with the consecutive failure count including this failure.
    pub fn on_attempt_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::AttemptFailed {
                consecutive_failures,
                ..
            } = event
            {
                f(*consecutive_failures);
            }
        }));
        self
    }

    /// Registers a callback for attempts dropped because another was in flight.
    pub fn on_attempt_dropped<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::AttemptDropped { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback for status transitions.
    ///
    /// # Callback Signature
    /// `Fn(ConnectionStatus, ConnectionStatus)` - Called with the old and new status.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionStatus, ConnectionStatus) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Registers a callback for a successful connect that ends a failure episode.
    ///
    /// # Callback Signature
    /// `Fn(u64, Duration)` - Called with the number of failures and the episode length.
    pub fn on_recovered<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Recovered {
                failures, downtime, ..
            } = event
            {
                f(*failures, *downtime);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SupervisorConfig {
        SupervisorConfig {
            name: self.name,
            period: self.period,
            policy: FailureLogPolicy::new(self.warning_every, self.shutdown_timeout),
            initial_connect: self.initial_connect,
            check: self.check,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for SupervisorConfigBuilder {
    fn default() -> Self {
        Self {
            name: "supervisor".to_string(),
            period: DEFAULT_PERIOD,
            warning_every: 1,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            initial_connect: true,
            check: false,
            event_listeners: EventListeners::new(),
        }
    }
}
