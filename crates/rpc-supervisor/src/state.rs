//! Connection state tracking for the reconnection supervisor.
//!
//! [`ConnectionState`] is a plain value: the supervisor owns the only mutable
//! copy and hands out snapshots. The current run of failures is modelled as a
//! single [`FailureEpisode`] so that "failures > 0", "episode start is set" and
//! "error already escalated" can never disagree with each other.

use std::time::Duration;
use tokio::time::Instant;

/// Connectivity status of a supervised client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Not connected; the scheduler keeps retrying.
    Disconnected = 0,

    /// Connected; scheduled attempts are no-ops.
    Connected = 1,

    /// Closed by the owner. Terminal.
    Closed = 2,
}

impl ConnectionStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionStatus::Connected,
            2 => ConnectionStatus::Closed,
            _ => ConnectionStatus::Disconnected,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unbroken run of failed connection attempts.
///
/// Created by the first failure after a success (or after supervisor
/// creation) and discarded as a whole by the next success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureEpisode {
    started_at: Instant,
    failures: u64,
    escalated: bool,
}

impl FailureEpisode {
    fn begin(now: Instant) -> Self {
        Self {
            started_at: now,
            failures: 0,
            escalated: false,
        }
    }

    /// When the first failure of this episode was recorded.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Number of failed attempts in this episode. Always at least 1.
    pub fn consecutive_failures(&self) -> u64 {
        self.failures
    }

    /// Whether the one-shot error escalation already fired for this episode.
    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    /// Time between the episode start and `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub(crate) fn escalate(&mut self) {
        self.escalated = true;
    }
}

/// Snapshot of a supervisor's connectivity and current failure episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    status: ConnectionStatus,
    episode: Option<FailureEpisode>,
}

impl ConnectionState {
    /// A fresh, disconnected state with no failures recorded.
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            episode: None,
        }
    }

    /// Current connectivity status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the status is [`ConnectionStatus::Connected`].
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Whether the status is [`ConnectionStatus::Closed`].
    pub fn is_closed(&self) -> bool {
        self.status == ConnectionStatus::Closed
    }

    /// Failed attempts since the last success, or 0 outside an episode.
    pub fn consecutive_failures(&self) -> u64 {
        self.episode.map_or(0, |e| e.failures)
    }

    /// Start of the current failure episode, if one is in progress.
    pub fn episode_started_at(&self) -> Option<Instant> {
        self.episode.map(|e| e.started_at)
    }

    /// Whether an error was already escalated for the current episode.
    pub fn error_escalated(&self) -> bool {
        self.episode.is_some_and(|e| e.escalated)
    }

    /// The current failure episode, if any.
    pub fn episode(&self) -> Option<&FailureEpisode> {
        self.episode.as_ref()
    }

    /// Records a failed attempt at `now`, opening an episode if needed.
    ///
    /// Returns `None` without touching anything once closed.
    pub(crate) fn record_failure(&mut self, now: Instant) -> Option<&mut FailureEpisode> {
        if self.is_closed() {
            return None;
        }
        self.status = ConnectionStatus::Disconnected;
        let episode = self.episode.get_or_insert_with(|| FailureEpisode::begin(now));
        episode.failures = episode.failures.saturating_add(1);
        Some(episode)
    }

    /// Moves to `Connected`, ending the current episode.
    ///
    /// Returns the finished episode, if there was one.
    pub(crate) fn mark_connected(&mut self) -> Option<FailureEpisode> {
        if self.is_closed() {
            return None;
        }
        self.status = ConnectionStatus::Connected;
        self.episode.take()
    }

    /// Moves from `Connected` back to `Disconnected`.
    ///
    /// Returns `false` if the state was not connected.
    pub(crate) fn mark_disconnected(&mut self) -> bool {
        if self.status != ConnectionStatus::Connected {
            return false;
        }
        self.status = ConnectionStatus::Disconnected;
        true
    }

    /// Freezes the state. Returns the status held before closing, or `None`
    /// if it was already closed.
    pub(crate) fn close(&mut self) -> Option<ConnectionStatus> {
        if self.is_closed() {
            return None;
        }
        let previous = self.status;
        self.status = ConnectionStatus::Closed;
        Some(previous)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
