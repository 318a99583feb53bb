//! bluechat Core - Shared types for the point-to-point chat session
//!
//! This crate provides the core domain types shared between
//! the radio capabilities (bluechat-radio), the session manager
//! (bluechat-session) and the terminal client (bluechat-cli).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod event;
pub mod message;
pub mod peer;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use error::{SessionError, SessionResult};
pub use event::SessionEvent;
pub use message::{ChatMessage, Direction};
pub use peer::{PeerAddress, PeerIdentity};
pub use service::{ServiceRecord, DEFAULT_SERVICE_NAME, SERIAL_PORT_SERVICE_ID};
pub use session::{Role, SessionState};
