//! Chat messages exchanged over an established session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Written by the local side.
    Sent,
    /// Read from the remote side.
    Received,
}

impl Direction {
    /// Speaker label used when rendering a conversation.
    #[must_use]
    pub fn speaker(&self) -> &'static str {
        match self {
            Self::Sent => "Me",
            Self::Received => "Them",
        }
    }
}

/// One chat message.
///
/// The payload is exactly the bytes handed to `send` (outbound) or returned
/// by a single transport read (inbound). There is no framing: an inbound
/// message is whatever one read produced, so a long remote message may
/// arrive as several `ChatMessage`s and two short ones may arrive as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sent or Received
    pub direction: Direction,

    /// Raw bytes as written or read
    pub payload: Vec<u8>,

    /// When the message was produced locally
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates an outbound message stamped now.
    pub fn sent(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            direction: Direction::Sent,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an inbound message stamped now.
    pub fn received(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            direction: Direction::Received,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Decodes the payload as text.
    ///
    /// Invalid UTF-8 (for example a multi-byte character split across two
    /// reads) is replaced with U+FFFD rather than rejected.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Number of payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.direction.speaker(), self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_speaker_labels() {
        assert_eq!(ChatMessage::sent("hello").to_string(), "Me: hello");
        assert_eq!(ChatMessage::received(b"hi".to_vec()).to_string(), "Them: hi");
    }

    #[test]
    fn test_text_is_lossy() {
        // First byte of a two-byte sequence only
        let msg = ChatMessage::received(vec![b'a', 0xC3]);
        assert_eq!(msg.text(), "a\u{FFFD}");
        assert_eq!(msg.len(), 2);
    }

    #[test]
    fn test_direction() {
        assert_eq!(ChatMessage::sent("x").direction, Direction::Sent);
        assert_eq!(ChatMessage::received("x").direction, Direction::Received);
        assert!(ChatMessage::sent(Vec::new()).is_empty());
    }
}
