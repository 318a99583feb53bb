//! TCP emulation of the radio.
//!
//! Peers are configured up front as `host:port` addresses; "discovery"
//! reports them, "listening" binds a TCP socket and "connecting" dials one.
//! The service identifier is not negotiated over TCP, so a host accepts any
//! joiner that reaches its port.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use bluechat_core::{PeerAddress, PeerIdentity, ServiceRecord};

use crate::{Channel, DiscoverySink, Listener, Radio, RadioError};

/// Default address the host side binds.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7878";

/// A peer known to the TCP backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpPeer {
    /// `host:port` to dial
    pub address: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

impl From<&TcpPeer> for PeerIdentity {
    fn from(peer: &TcpPeer) -> Self {
        PeerIdentity {
            address: PeerAddress::new(peer.address.clone()),
            name: peer.name.clone(),
        }
    }
}

/// Configuration of the TCP backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpRadioConfig {
    /// Name this device announces
    pub local_name: String,

    /// Address the host side binds
    pub listen_addr: String,

    /// Peers reported by discovery
    pub peers: Vec<TcpPeer>,
}

impl Default for TcpRadioConfig {
    fn default() -> Self {
        Self {
            local_name: "bluechat".to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            peers: Vec::new(),
        }
    }
}

// ============================================================================
// Radio
// ============================================================================

/// Radio backed by plain TCP sockets.
pub struct TcpRadio {
    config: TcpRadioConfig,
    scan: Mutex<Option<JoinHandle<()>>>,
}

impl TcpRadio {
    /// Creates a TCP radio.
    pub fn new(config: TcpRadioConfig) -> Self {
        Self {
            config,
            scan: Mutex::new(None),
        }
    }

    fn take_scan(&self) -> Option<JoinHandle<()>> {
        self.scan
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl Radio for TcpRadio {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn paired_peers(&self) -> Result<Vec<PeerIdentity>, RadioError> {
        Ok(Vec::new())
    }

    async fn start_discovery(&self, sink: DiscoverySink) -> Result<(), RadioError> {
        if let Some(previous) = self.take_scan() {
            previous.abort();
        }

        let peers: Vec<PeerIdentity> = self.config.peers.iter().map(PeerIdentity::from).collect();
        let task = tokio::spawn(async move {
            for peer in peers {
                if sink.send(peer).is_err() {
                    break;
                }
            }
        });

        *self
            .scan
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(task);
        debug!(peers = self.config.peers.len(), "TCP discovery started");
        Ok(())
    }

    async fn cancel_discovery(&self) -> Result<(), RadioError> {
        if let Some(task) = self.take_scan() {
            task.abort();
        }
        Ok(())
    }

    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn Listener>, RadioError> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, service = %service, "TCP listener bound");

        Ok(Box::new(TcpListenerHandle {
            local_addr,
            inner: AsyncMutex::new(Some(listener)),
            closed: AtomicBool::new(false),
        }))
    }

    async fn connect(
        &self,
        peer: &PeerIdentity,
        _service: &ServiceRecord,
    ) -> Result<Box<dyn Channel>, RadioError> {
        let stream = TcpStream::connect(peer.address.as_str())
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::ConnectionRefused => RadioError::Unreachable(peer.address.clone()),
                _ => RadioError::Io(e),
            })?;
        debug!(peer = %peer, "TCP connection established");
        Ok(Box::new(TcpChannel::new(peer.clone(), stream)))
    }
}

// ============================================================================
// Listener
// ============================================================================

/// A bound TCP listener.
pub struct TcpListenerHandle {
    local_addr: SocketAddr,
    inner: AsyncMutex<Option<TcpListener>>,
    closed: AtomicBool,
}

#[async_trait]
impl Listener for TcpListenerHandle {
    async fn accept(&self) -> Result<Box<dyn Channel>, RadioError> {
        let guard = self.inner.lock().await;
        let listener = guard.as_ref().ok_or(RadioError::ListenerClosed)?;
        let (stream, remote) = listener.accept().await?;
        debug!(remote = %remote, "TCP connection accepted");

        let peer = PeerIdentity::unnamed(remote.to_string());
        Ok(Box::new(TcpChannel::new(peer, stream)))
    }

    async fn close(&self) -> Result<(), RadioError> {
        // A pending accept holds the lock; the session cancels it before closing
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.inner.lock().await.take();
            debug!(addr = %self.local_addr, "TCP listener closed");
        }
        Ok(())
    }
}

// ============================================================================
// Channel
// ============================================================================

/// A connected TCP stream.
pub struct TcpChannel {
    peer: PeerIdentity,
    reader: AsyncMutex<OwnedReadHalf>,
    writer: AsyncMutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

impl TcpChannel {
    fn new(peer: PeerIdentity, stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Self {
            peer,
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Channel for TcpChannel {
    fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel closed"));
        }
        self.reader.lock().await.read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel closed"));
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await
    }

    async fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.writer.lock().await.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}
