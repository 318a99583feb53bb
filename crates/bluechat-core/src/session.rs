//! Role and session state machine values.

use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Role
// ============================================================================

/// Which side of the asymmetric handshake this device plays.
///
/// Set once per connection attempt and immutable until teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No role chosen yet (or reset after teardown).
    #[default]
    Unselected,

    /// Discoverable; listens and accepts one incoming connection.
    Host,

    /// Scans for peers and connects to the one the user picks.
    Join,
}

impl Role {
    /// Returns the display label for this role.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unselected => "unselected",
            Self::Host => "host",
            Self::Join => "join",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle state of a session manager.
///
/// ```text
/// Idle ─┬─ Host ─▶ Advertising ──accept──┐
///       └─ Join ─▶ Scanning ─select─▶ Connecting ──connect──┤
///                                                          ▼
///                                    Connected ─eof─▶ Closed
///            any ─close()─▶ Closed       └─error─▶ Failed(reason)
/// ```
///
/// Exactly one transport endpoint exists while `Connected`; none otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing selected yet.
    #[default]
    Idle,

    /// Host side: discoverable and waiting for a peer to connect.
    Advertising,

    /// Join side: discovering peers, waiting for the user to pick one.
    Scanning,

    /// Join side: connect attempt to the selected peer in flight.
    Connecting,

    /// Duplex channel established; reading and writing.
    Connected,

    /// Torn down cleanly (local close or remote end-of-stream).
    Closed,

    /// The attempt or the established channel failed.
    Failed(SessionError),
}

impl SessionState {
    /// Returns the display label for this state.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Advertising => "advertising",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns true if a role may be selected from this state.
    ///
    /// `Closed` is a rest state: after teardown the caller restarts with a
    /// fresh role selection.
    #[must_use]
    pub fn accepts_role_selection(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }

    /// Returns true if the session reached an end state for this attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }

    /// Returns true if the session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the failure reason, if any.
    pub fn failure(&self) -> Option<&SessionError> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_default_and_labels() {
        assert_eq!(Role::default(), Role::Unselected);
        assert_eq!(Role::Host.to_string(), "host");
        assert_eq!(Role::Join.label(), "join");
    }

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::Idle.accepts_role_selection());
        assert!(SessionState::Closed.accepts_role_selection());
        assert!(!SessionState::Scanning.accepts_role_selection());
        assert!(!SessionState::Failed(SessionError::NotConnected).accepts_role_selection());

        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed(SessionError::RadioUnavailable).is_terminal());
        assert!(!SessionState::Connected.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Connected.to_string(), "connected");
        assert_eq!(
            SessionState::Failed(SessionError::ConnectFailed("timed out".into())).to_string(),
            "failed (connect failed: timed out)"
        );
    }

    #[test]
    fn test_failure_accessor() {
        let state = SessionState::Failed(SessionError::PermissionDenied);
        assert_eq!(state.failure(), Some(&SessionError::PermissionDenied));
        assert_eq!(SessionState::Idle.failure(), None);
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&SessionState::Scanning).unwrap();
        assert_eq!(json, r#"{"state":"scanning"}"#);

        let failed = SessionState::Failed(SessionError::AcceptFailed("closed".into()));
        let json = serde_json::to_string(&failed).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failed);
    }
}
