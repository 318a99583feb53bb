//! bluechat Radio - capabilities consumed by the session manager
//!
//! The session core never talks to a Bluetooth stack directly. It consumes
//! three capabilities defined here:
//!
//! - [`Radio`] - adapter state, paired devices, discovery, discoverability,
//!   listening and connecting on a service record
//! - [`Listener`] / [`Channel`] - the listening endpoint and the connected
//!   duplex byte channel it yields
//! - [`Permissions`] - runtime authorization checks
//!
//! Two backends ship with the crate:
//!
//! - [`sim`] - an in-memory shared medium used by the test suites
//! - [`tcp`] - a TCP emulation so two processes can chat without a radio
//!
//! # Discovery callbacks
//!
//! Platform discovery is callback driven. [`Radio::start_discovery`] takes a
//! [`DiscoverySink`]; the backend pushes every sighting into it from
//! whatever execution context its callbacks run on, and the single consumer
//! on the other end owns all registry mutation.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use bluechat_core::{PeerIdentity, ServiceRecord};

mod error;
mod permissions;
pub mod sim;
pub mod tcp;

pub use error::RadioError;
pub use permissions::StaticPermissions;

/// Queue into which a radio pushes discovered peers.
pub type DiscoverySink = mpsc::UnboundedSender<PeerIdentity>;

// ============================================================================
// Capabilities
// ============================================================================

/// The local radio adapter.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Returns true if the adapter is present and switched on.
    fn is_enabled(&self) -> bool;

    /// Devices already bonded with this adapter.
    async fn paired_peers(&self) -> Result<Vec<PeerIdentity>, RadioError>;

    /// Starts discovery; every sighting is pushed into `sink` until
    /// [`Radio::cancel_discovery`] is called.
    async fn start_discovery(&self, sink: DiscoverySink) -> Result<(), RadioError>;

    /// Stops discovery. Must be safe to call when not discovering.
    async fn cancel_discovery(&self) -> Result<(), RadioError>;

    /// Makes the local device visible to scanners for `duration`.
    async fn make_discoverable(&self, _duration: Duration) -> Result<(), RadioError> {
        Ok(())
    }

    /// Ends a discoverability window early. Must be safe to call when not
    /// discoverable.
    async fn cancel_discoverable(&self) -> Result<(), RadioError> {
        Ok(())
    }

    /// Opens a listening endpoint registered under `service`.
    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn Listener>, RadioError>;

    /// Opens a duplex channel to `peer` on `service`.
    async fn connect(
        &self,
        peer: &PeerIdentity,
        service: &ServiceRecord,
    ) -> Result<Box<dyn Channel>, RadioError>;
}

/// A listening endpoint returned by [`Radio::listen`].
#[async_trait]
pub trait Listener: Send + Sync {
    /// Waits for one incoming connection.
    async fn accept(&self) -> Result<Box<dyn Channel>, RadioError>;

    /// Stops listening and unregisters the service. Idempotent.
    async fn close(&self) -> Result<(), RadioError>;
}

/// A connected duplex byte channel.
///
/// `read` and `write` may run concurrently from different tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// The remote end of this channel.
    fn peer(&self) -> &PeerIdentity;

    /// Reads up to `buf.len()` bytes. `Ok(0)` means end-of-stream.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `buf`.
    async fn write(&self, buf: &[u8]) -> io::Result<()>;

    /// Closes the channel. Closing an already closed channel is a no-op.
    async fn close(&self) -> io::Result<()>;
}

/// Runtime authorization for radio operations.
#[async_trait]
pub trait Permissions: Send + Sync {
    /// Returns true if every permission needed for scanning, advertising
    /// and connecting is granted.
    fn has_required_permissions(&self) -> bool;

    /// Asks the platform to grant the missing permissions.
    ///
    /// Returns whether all of them are granted afterwards.
    async fn request_permissions(&self) -> bool;
}
