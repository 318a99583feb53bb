//! Client interface for interacting with the SessionActor.
//!
//! The `SessionHandle` is a cheap-to-clone interface for issuing session
//! operations and subscribing to session events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `SessionError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use bluechat_core::{
    ChatMessage, PeerIdentity, Role, SessionError, SessionEvent, SessionResult, SessionState,
};

use crate::registry::SharedRegistry;

use super::commands::SessionCommand;

// ============================================================================
// Session Handle
// ============================================================================

/// Handle for driving a session.
///
/// Dropping the last handle shuts the actor down and closes any open
/// endpoint.
///
/// # Usage
///
/// ```ignore
/// let session = spawn_session(radio, permissions, SessionConfig::default());
/// let mut events = session.subscribe();
///
/// session.select_role(Role::Join).await?;
/// // ... wait for PeerDiscovered, then
/// session.select_peer(peer).await?;
/// // ... wait for StateChanged { state: Connected }, then
/// session.send("hello").await?;
/// session.close().await?;
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<SessionCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<SessionEvent>,

    /// Peers found by the current scan
    registry: SharedRegistry,
}

impl SessionHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<SessionCommand>,
        event_sender: broadcast::Sender<SessionEvent>,
        registry: SharedRegistry,
    ) -> Self {
        Self {
            sender,
            event_sender,
            registry,
        }
    }

    /// Chooses host or join and starts advertising or scanning.
    ///
    /// Accepted from `Idle` and `Closed`.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside `Idle`/`Closed`
    /// - `SessionError::PermissionDenied` / `SessionError::RadioUnavailable`
    ///   when preconditions fail (the session also moves to `Failed`)
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn select_role(&self, role: Role) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::SelectRole {
                role,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Connects to a peer found while scanning.
    ///
    /// Returns once the attempt has started; the outcome arrives as a
    /// `StateChanged` event.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless scanning
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn select_peer(&self, peer: PeerIdentity) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::SelectPeer {
                peer,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Queues a payload for the remote side and returns the sent message.
    ///
    /// Does not wait for delivery; a write failure later moves the session
    /// to `Failed`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotConnected` unless connected
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> SessionResult<ChatMessage> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Send {
                payload: payload.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Tears the session down. Valid in every state and idempotent.
    pub async fn close(&self) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Close { respond_to: tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Current session state.
    pub async fn state(&self) -> SessionResult<SessionState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::GetState { respond_to: tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Current role.
    pub async fn role(&self) -> SessionResult<Role> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::GetRole { respond_to: tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Snapshot of the peers found by the current scan, in discovery order.
    pub async fn peers(&self) -> Vec<PeerIdentity> {
        self.registry.read().await.snapshot()
    }

    /// Subscribe to session events.
    ///
    /// Only events published after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// Returns true while the session actor is running.
    ///
    /// This says nothing about the radio link; see [`SessionState::Connected`].
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}
