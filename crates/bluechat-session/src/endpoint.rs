//! Transport endpoint - the connected channel owned by one session.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use bluechat_core::PeerIdentity;
use bluechat_radio::Channel;

/// Exclusive owner of a connected duplex channel.
///
/// The read loop and the writer share it behind an `Arc`; only the session
/// actor closes it. The first `close()` closes the channel, later calls do
/// nothing.
pub struct TransportEndpoint {
    channel: Box<dyn Channel>,
    closed: AtomicBool,
}

impl TransportEndpoint {
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            channel,
            closed: AtomicBool::new(false),
        }
    }

    /// The remote peer.
    pub fn peer(&self) -> &PeerIdentity {
        self.channel.peer()
    }

    /// Reads up to `buf.len()` bytes; `Ok(0)` is end-of-stream.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.channel.read(buf).await
    }

    /// Writes the whole payload.
    pub async fn write(&self, payload: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.channel.write(payload).await
    }

    /// Closes the channel once.
    pub async fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(peer = %self.peer(), "Closing transport endpoint");
        self.channel.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "endpoint closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluechat_core::ServiceRecord;
    use bluechat_radio::sim::SimAir;
    use bluechat_radio::Radio;

    #[tokio::test]
    async fn test_close_reaches_channel_once() {
        let air = SimAir::new();
        let host = air.radio(PeerIdentity::unnamed("AA"));
        let join = air.radio(PeerIdentity::unnamed("BB"));
        let service = ServiceRecord::default();

        let _listener = host.listen(&service).await.unwrap();
        let channel = join.connect(host.identity(), &service).await.unwrap();
        let endpoint = TransportEndpoint::new(channel);

        endpoint.close().await.unwrap();
        endpoint.close().await.unwrap();
        endpoint.close().await.unwrap();

        assert!(endpoint.is_closed());
        assert_eq!(join.close_calls(), 1);
        assert_eq!(join.open_channels(), 0);
        assert!(endpoint.write(b"late").await.is_err());
    }
}
