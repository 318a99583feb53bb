//! bluechat Session - discovery and session lifecycle for a point-to-point
//! chat over a short-range radio link.
//!
//! This crate provides:
//! - `session` - the session actor and its [`SessionHandle`]
//! - `discovery` - advertising for the host role, scanning for the join role
//! - `registry` - peers found by the current scan
//! - `endpoint` - the connected channel owned by a session
//! - `config` - session tunables loaded from TOML
//!
//! # Lifecycle
//!
//! ```text
//!          select_role(Host)                 accept
//!   Idle ───────────────────▶ Advertising ───────────┐
//!    │                                               ▼
//!    │ select_role(Join)         select_peer     Connected ──▶ Closed
//!    └──────────────────▶ Scanning ─────▶ Connecting ─┘   │
//!                                                          └──▶ Failed
//! ```
//!
//! `close()` moves any state to `Closed`; a new role may be selected from
//! `Closed`.

pub mod config;
pub mod discovery;
pub mod endpoint;
mod read_loop;
pub mod registry;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use discovery::{DiscoveryController, ScanGate};
pub use endpoint::TransportEndpoint;
pub use registry::{DeviceRegistry, SharedRegistry};
pub use session::{spawn_session, SessionHandle};

pub use bluechat_core::{
    ChatMessage, Direction, PeerAddress, PeerIdentity, Role, ServiceRecord, SessionError,
    SessionEvent, SessionResult, SessionState,
};
