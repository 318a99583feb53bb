//! Session manager using the actor pattern.
//!
//! The session actor is the single owner of the state machine. Callers talk
//! to it through a [`SessionHandle`]; background activities report back
//! through the same command queue.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐ SessionCommand ┌────────────────┐ SessionEvent ┌──────────────┐
//! │ SessionHandle │───────────────▶│  SessionActor  │─────────────▶│ UI observers │
//! └───────────────┘    (mpsc)      └───────┬────────┘  (broadcast) └──────────────┘
//!                                          │ spawns, cancels, joins
//!                  ┌───────────────────────┼───────────────────────┐
//!                  ▼                       ▼                       ▼
//!          accept / connect            read loop                 writer
//!                  └──── completions tagged with the attempt ──────┘
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use bluechat_radio::{Permissions, Radio};

use crate::config::SessionConfig;
use crate::registry::DeviceRegistry;

mod actor;
pub(crate) mod commands;
mod handle;
mod writer;

pub use handle::SessionHandle;

use actor::SessionActor;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn a session actor and return a handle for interaction.
///
/// The session starts in `Idle` with no role.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use bluechat_core::{PeerIdentity, Role};
/// use bluechat_radio::{sim::SimAir, StaticPermissions};
/// use bluechat_session::{spawn_session, SessionConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let air = SimAir::new();
///     let radio = Arc::new(air.radio(PeerIdentity::new("00:01", "me")));
///     let session = spawn_session(
///         radio,
///         Arc::new(StaticPermissions::granted()),
///         SessionConfig::default(),
///     );
///     session.select_role(Role::Host).await.ok();
/// }
/// ```
pub fn spawn_session(
    radio: Arc<dyn Radio>,
    permissions: Arc<dyn Permissions>,
    config: SessionConfig,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));
    let registry = DeviceRegistry::shared();

    let actor = SessionActor::new(
        cmd_rx,
        cmd_tx.downgrade(),
        event_tx.clone(),
        radio,
        permissions,
        Arc::clone(&registry),
        config,
    );
    tokio::spawn(actor.run());

    SessionHandle::new(cmd_tx, event_tx, registry)
}
