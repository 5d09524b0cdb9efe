//! Error types for the reconnection supervisor.

/// Errors surfaced to callers of the manual reconnect path.
///
/// Scheduled attempts never produce these; their failures only update state
/// and feed the log policy.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError<E> {
    /// The transport failed to connect.
    #[error("client reconnect to {target} failed: {source}")]
    Connect {
        /// The target the transport tried to reach.
        target: String,
        /// The transport's error.
        #[source]
        source: E,
    },

    /// The client has been closed.
    #[error("client to {target} is closed")]
    Closed {
        /// The target of the closed client.
        target: String,
    },
}

impl<E> SupervisorError<E> {
    /// Returns true if this is a connect failure.
    pub fn is_connect(&self) -> bool {
        matches!(self, SupervisorError::Connect { .. })
    }

    /// Returns true if the client was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, SupervisorError::Closed { .. })
    }

    /// Returns the transport error, if this is a connect failure.
    pub fn connect_error(&self) -> Option<&E> {
        match self {
            SupervisorError::Connect { source, .. } => Some(source),
            SupervisorError::Closed { .. } => None,
        }
    }

    /// The target this error refers to.
    pub fn target(&self) -> &str {
        match self {
            SupervisorError::Connect { target, .. } | SupervisorError::Closed { target } => target,
        }
    }
}

/// Result type for supervisor operations.
pub type Result<T, E> = std::result::Result<T, SupervisorError<E>>;
