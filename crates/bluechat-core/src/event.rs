//! Events published by a session manager to its observers.

use crate::{ChatMessage, PeerIdentity, SessionState};
use serde::{Deserialize, Serialize};

/// Events broadcast to UI collaborators.
///
/// Values are immutable snapshots; observers keep their own render state and
/// never reach into the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved to a new state.
    StateChanged {
        /// The state after the transition
        state: SessionState,
    },

    /// Discovery saw a peer address for the first time in this scan.
    PeerDiscovered {
        /// The discovered peer
        peer: PeerIdentity,
    },

    /// One chunk was read from the remote side.
    MessageReceived {
        /// The inbound message
        message: ChatMessage,
    },

    /// A payload was queued for writing.
    MessageSent {
        /// The outbound message
        message: ChatMessage,
    },
}

impl SessionEvent {
    /// Returns the new state if this is a state change.
    pub fn state(&self) -> Option<&SessionState> {
        match self {
            Self::StateChanged { state } => Some(state),
            _ => None,
        }
    }

    /// Returns the message carried by this event, if any.
    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            Self::MessageReceived { message } | Self::MessageSent { message } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let event = SessionEvent::StateChanged {
            state: SessionState::Connected,
        };
        assert_eq!(event.state(), Some(&SessionState::Connected));
        assert!(event.message().is_none());

        let event = SessionEvent::MessageReceived {
            message: ChatMessage::received("hi"),
        };
        assert!(event.state().is_none());
        assert_eq!(event.message().map(|m| m.payload.clone()), Some(b"hi".to_vec()));
    }

    #[test]
    fn test_event_tag() {
        let event = SessionEvent::PeerDiscovered {
            peer: PeerIdentity::unnamed("AA"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "peer_discovered");
        assert_eq!(json["peer"]["address"], "AA");
    }
}
