//! Errors raised by radio backends.

use std::io;

use bluechat_core::{PeerAddress, SessionError};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in a radio capability.
#[derive(Debug, Error)]
pub enum RadioError {
    /// Adapter switched off or absent.
    #[error("radio is disabled")]
    Disabled,

    /// The platform refused the operation for lack of authorization.
    #[error("radio permission denied")]
    PermissionDenied,

    /// No device answered at this address.
    #[error("peer {0} is unreachable")]
    Unreachable(PeerAddress),

    /// The peer is reachable but does not offer the requested service.
    #[error("peer {peer} does not offer service {service}")]
    ServiceNotOffered {
        /// The peer that was contacted
        peer: PeerAddress,
        /// The service identifier that was requested
        service: Uuid,
    },

    /// The listening endpoint was closed.
    #[error("listener closed")]
    ListenerClosed,

    /// Operation not supported by this backend.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Underlying I/O failure.
    #[error("radio i/o error: {0}")]
    Io(#[from] io::Error),
}

impl RadioError {
    /// Maps this error into the session taxonomy.
    ///
    /// Adapter and permission failures keep their own kinds; everything else
    /// is wrapped by `wrap`, typically `SessionError::ConnectFailed` or
    /// `SessionError::AcceptFailed` depending on which step failed.
    pub fn into_session(self, wrap: impl FnOnce(String) -> SessionError) -> SessionError {
        match self {
            Self::Disabled => SessionError::RadioUnavailable,
            Self::PermissionDenied => SessionError::PermissionDenied,
            other => wrap(other.to_string()),
        }
    }
}
