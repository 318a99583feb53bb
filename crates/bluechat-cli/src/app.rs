//! Render model for the line-based chat.
//!
//! `ChatView` folds session events into what the user sees: the session
//! state, the peer list while scanning and the message log. `apply` returns
//! the lines to print for each event; failures become a one-line notice.

use bluechat_core::{ChatMessage, PeerIdentity, SessionError, SessionEvent, SessionState};

// ============================================================================
// Chat View
// ============================================================================

/// What the user currently sees.
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    /// Last known session state.
    pub state: SessionState,

    /// Peers listed while scanning, in discovery order.
    pub peers: Vec<PeerIdentity>,

    /// Messages exchanged in this session.
    pub messages: Vec<ChatMessage>,
}

impl ChatView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event and returns the lines to print.
    pub fn apply(&mut self, event: &SessionEvent) -> Vec<String> {
        match event {
            SessionEvent::StateChanged { state } => self.apply_state(state),
            SessionEvent::PeerDiscovered { peer } => {
                if self.peers.iter().any(|p| p.address == peer.address) {
                    return Vec::new();
                }
                self.peers.push(peer.clone());
                vec![format!("found [{}] {}", self.peers.len(), peer)]
            }
            SessionEvent::MessageReceived { message } | SessionEvent::MessageSent { message } => {
                self.messages.push(message.clone());
                vec![message.to_string()]
            }
        }
    }

    fn apply_state(&mut self, state: &SessionState) -> Vec<String> {
        self.state = state.clone();
        let line = match state {
            SessionState::Idle => return Vec::new(),
            SessionState::Advertising => "waiting for a peer to join...".to_string(),
            SessionState::Scanning => {
                self.peers.clear();
                "scanning for peers, /connect N to join one".to_string()
            }
            SessionState::Connecting => {
                self.peers.clear();
                "connecting...".to_string()
            }
            SessionState::Connected => {
                self.messages.clear();
                "connected, type to chat, /quit to leave".to_string()
            }
            SessionState::Closed => "session closed".to_string(),
            SessionState::Failed(reason) => failure_notice(reason),
        };
        vec![line]
    }

    /// The numbered peer list.
    pub fn peer_lines(&self) -> Vec<String> {
        if self.peers.is_empty() {
            return vec!["no peers found yet".to_string()];
        }
        self.peers
            .iter()
            .enumerate()
            .map(|(i, peer)| format!("[{}] {}", i + 1, peer))
            .collect()
    }

    /// Returns true once the session has ended for good.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

/// User-facing text for a failure.
fn failure_notice(reason: &SessionError) -> String {
    match reason {
        SessionError::RadioUnavailable => "radio is off, enable it and try again".to_string(),
        SessionError::PermissionDenied => "radio permissions are required".to_string(),
        other => format!("session failed: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(state: SessionState) -> SessionEvent {
        SessionEvent::StateChanged { state }
    }

    #[test]
    fn test_messages_rendered_with_speaker() {
        let mut view = ChatView::new();
        view.apply(&state(SessionState::Connected));

        let sent = view.apply(&SessionEvent::MessageSent {
            message: ChatMessage::sent("hello"),
        });
        let received = view.apply(&SessionEvent::MessageReceived {
            message: ChatMessage::received("hi"),
        });

        assert_eq!(sent, vec!["Me: hello"]);
        assert_eq!(received, vec!["Them: hi"]);
        assert_eq!(view.messages.len(), 2);
    }

    #[test]
    fn test_peer_list_numbered_and_deduplicated() {
        let mut view = ChatView::new();
        view.apply(&state(SessionState::Scanning));

        let first = view.apply(&SessionEvent::PeerDiscovered {
            peer: PeerIdentity::new("AA", "phone"),
        });
        view.apply(&SessionEvent::PeerDiscovered {
            peer: PeerIdentity::unnamed("BB"),
        });
        let repeat = view.apply(&SessionEvent::PeerDiscovered {
            peer: PeerIdentity::new("AA", "phone"),
        });

        assert_eq!(first, vec!["found [1] phone (AA)"]);
        assert!(repeat.is_empty());
        assert_eq!(view.peer_lines(), vec!["[1] phone (AA)", "[2] BB"]);
    }

    #[test]
    fn test_new_scan_clears_peers() {
        let mut view = ChatView::new();
        view.apply(&state(SessionState::Scanning));
        view.apply(&SessionEvent::PeerDiscovered {
            peer: PeerIdentity::unnamed("AA"),
        });
        view.apply(&state(SessionState::Closed));
        view.apply(&state(SessionState::Scanning));

        assert!(view.peers.is_empty());
        assert_eq!(view.peer_lines(), vec!["no peers found yet"]);
    }

    #[test]
    fn test_failure_becomes_notice() {
        let mut view = ChatView::new();
        let lines = view.apply(&state(SessionState::Failed(SessionError::RadioUnavailable)));

        assert_eq!(lines, vec!["radio is off, enable it and try again"]);
        assert!(view.is_finished());
    }

    #[test]
    fn test_idle_prints_nothing() {
        let mut view = ChatView::new();
        assert!(view.apply(&state(SessionState::Idle)).is_empty());
        assert!(!view.is_finished());
    }
}
