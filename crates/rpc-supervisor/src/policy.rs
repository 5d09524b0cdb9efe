//! Failure log policy: turns a stream of failed attempts into bounded log output.
//!
//! Two independent signals are derived from every failure:
//!
//! - **Heartbeat** (WARN): fires on every `warning_every`-th consecutive failure,
//!   so a short retry period does not produce a log line per attempt.
//! - **Escalation** (ERROR): fires once per failure episode, the first time the
//!   episode has lasted longer than `shutdown_timeout`.
//!
//! Both may fire for the same failure. The policy is pure; the supervisor
//! applies the verdict and records the escalation on the episode.

use std::time::Duration;

/// Prefix shared by every policy log message.
pub const LOG_PREFIX: &str = "client reconnect to ";

/// What the policy decided for one failed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureVerdict {
    /// Emit a WARN heartbeat.
    pub warn: bool,
    /// Emit the one-shot ERROR escalation.
    pub escalate: bool,
}

impl FailureVerdict {
    /// Returns true if neither signal fires.
    pub fn is_silent(&self) -> bool {
        !self.warn && !self.escalate
    }
}

/// Decides which log signals a failed connection attempt produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureLogPolicy {
    warning_every: u64,
    shutdown_timeout: Duration,
}

impl FailureLogPolicy {
    /// Creates a policy.
    ///
    /// # Panics
    ///
    /// Panics if `warning_every` is zero.
    pub fn new(warning_every: u64, shutdown_timeout: Duration) -> Self {
        assert!(warning_every > 0, "warning_every must be at least 1");
        Self {
            warning_every,
            shutdown_timeout,
        }
    }

    /// Emit a WARN on every n-th consecutive failure.
    pub fn warning_every(&self) -> u64 {
        self.warning_every
    }

    /// Episode length after which the ERROR escalation fires.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Evaluates one failed attempt.
    ///
    /// `consecutive_failures` already includes the failure being evaluated and
    /// `elapsed` is measured from the first failure of the episode.
    pub fn evaluate(
        &self,
        consecutive_failures: u64,
        elapsed: Duration,
        escalated: bool,
    ) -> FailureVerdict {
        FailureVerdict {
            warn: consecutive_failures > 0 && consecutive_failures % self.warning_every == 0,
            escalate: !escalated && elapsed > self.shutdown_timeout,
        }
    }

    /// The WARN heartbeat message.
    pub fn warning_message(target: &str, consecutive_failures: u64) -> String {
        format!("{LOG_PREFIX}{target}, attempt #{consecutive_failures}")
    }

    /// The ERROR escalation message.
    pub fn escalation_message(target: &str, elapsed: Duration) -> String {
        format!("{LOG_PREFIX}{target} has been failing for {elapsed:?}")
    }
}

impl Default for FailureLogPolicy {
    fn default() -> Self {
        Self::new(1, crate::config::DEFAULT_SHUTDOWN_TIMEOUT)
    }
}
