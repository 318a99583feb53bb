//! Session actor commands.
//!
//! Two kinds of message share the actor's queue:
//! - requests from a [`SessionHandle`], each carrying a oneshot for the reply
//! - completions from background activities (accept/connect, read loop,
//!   writer), each tagged with the attempt generation that spawned them
//!
//! [`SessionHandle`]: super::SessionHandle

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use bluechat_core::{ChatMessage, PeerIdentity, Role, SessionResult, SessionState};
use bluechat_radio::Channel;

/// Why a read loop stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadEnd {
    /// The remote side closed the stream.
    Eof,
    /// A read failed.
    Error(String),
}

// ============================================================================
// Session Commands
// ============================================================================

pub(crate) enum SessionCommand {
    /// Choose host or join and start the matching discovery step.
    SelectRole {
        role: Role,
        respond_to: oneshot::Sender<SessionResult<()>>,
    },

    /// Connect to a peer found while scanning.
    SelectPeer {
        peer: PeerIdentity,
        respond_to: oneshot::Sender<SessionResult<()>>,
    },

    /// Queue a payload for the remote side.
    Send {
        payload: Vec<u8>,
        respond_to: oneshot::Sender<SessionResult<ChatMessage>>,
    },

    /// Tear everything down.
    Close { respond_to: oneshot::Sender<()> },

    GetState {
        respond_to: oneshot::Sender<SessionState>,
    },

    GetRole {
        respond_to: oneshot::Sender<Role>,
    },

    // ------------------------------------------------------------------------
    // Background completions
    // ------------------------------------------------------------------------
    /// The accept or connect attempt finished.
    Established {
        attempt: u64,
        result: SessionResult<Box<dyn Channel>>,
    },

    /// One chunk arrived.
    Inbound { attempt: u64, message: ChatMessage },

    /// The read loop stopped without being cancelled.
    ReadLoopEnded { attempt: u64, end: ReadEnd },

    /// The writer failed to deliver a payload.
    WriteFailed { attempt: u64, error: String },
}

impl SessionCommand {
    /// Short name for logging.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::SelectRole { .. } => "select_role",
            Self::SelectPeer { .. } => "select_peer",
            Self::Send { .. } => "send",
            Self::Close { .. } => "close",
            Self::GetState { .. } => "get_state",
            Self::GetRole { .. } => "get_role",
            Self::Established { .. } => "established",
            Self::Inbound { .. } => "inbound",
            Self::ReadLoopEnded { .. } => "read_loop_ended",
            Self::WriteFailed { .. } => "write_failed",
        }
    }

    /// Closes any channel carried by a command that will never be handled.
    pub(crate) async fn release(self) {
        if let Self::Established {
            result: Ok(channel),
            ..
        } = self
        {
            let _ = channel.close().await;
        }
    }
}

/// Delivers a background completion to the actor.
///
/// Background activities only hold a weak sender so they never keep a
/// dropped session alive. If the actor is gone the command is released.
pub(crate) async fn report(commands: &mpsc::WeakSender<SessionCommand>, command: SessionCommand) {
    let Some(sender) = commands.upgrade() else {
        debug!(command = command.name(), "Session actor gone, dropping completion");
        command.release().await;
        return;
    };

    if let Err(mpsc::error::SendError(command)) = sender.send(command).await {
        debug!(command = command.name(), "Session actor gone, dropping completion");
        command.release().await;
    }
}
