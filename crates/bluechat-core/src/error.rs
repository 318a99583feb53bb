//! Session error taxonomy following panic-free policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while driving a chat session.
///
/// `Clone + PartialEq` so the same value can be returned to the caller,
/// stored inside [`SessionState::Failed`](crate::SessionState::Failed) and
/// broadcast to every subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SessionError {
    /// The local radio is switched off or absent.
    #[error("radio unavailable: enable Bluetooth and try again")]
    RadioUnavailable,

    /// Required radio permissions have not been granted.
    #[error("permission denied: Bluetooth permissions are required")]
    PermissionDenied,

    /// Discovery could not be started or aborted unexpectedly.
    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    /// Outbound connect failed (peer unreachable, service absent, timeout).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The listening endpoint closed or errored before a peer connected.
    #[error("accept failed: {0}")]
    AcceptFailed(String),

    /// Read or write failure on an established channel.
    #[error("i/o error: {0}")]
    Io(String),

    /// Operation requires a connected session.
    #[error("not connected")]
    NotConnected,

    /// Operation is not valid in the current session state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation
        operation: String,
        /// Label of the state the session was in
        state: String,
    },

    /// The session actor has shut down.
    #[error("session channel closed")]
    ChannelClosed,
}

impl SessionError {
    /// Creates an I/O failure from any displayable error.
    pub fn io<E: std::fmt::Display>(err: E) -> Self {
        Self::Io(err.to_string())
    }

    /// Creates a state error for `operation` attempted in `state`.
    pub fn invalid_state(operation: &str, state: &crate::SessionState) -> Self {
        Self::InvalidState {
            operation: operation.to_string(),
            state: state.label().to_string(),
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionState;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SessionError::RadioUnavailable.to_string(),
            "radio unavailable: enable Bluetooth and try again"
        );
        assert_eq!(SessionError::NotConnected.to_string(), "not connected");
        assert_eq!(
            SessionError::ConnectFailed("timed out".to_string()).to_string(),
            "connect failed: timed out"
        );
        assert_eq!(
            SessionError::invalid_state("select a role", &SessionState::Scanning).to_string(),
            "cannot select a role while scanning"
        );
    }

    #[test]
    fn test_helpers() {
        let err = SessionError::io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        assert_eq!(err, SessionError::Io("pipe closed".to_string()));
        assert_eq!(
            SessionError::io("connection reset"),
            SessionError::Io("connection reset".to_string())
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&SessionError::ConnectFailed("x".into())).unwrap();
        assert_eq!(json, r#"{"kind":"connect_failed","detail":"x"}"#);

        let json = serde_json::to_string(&SessionError::NotConnected).unwrap();
        assert_eq!(json, r#"{"kind":"not_connected"}"#);
    }
}
