//! In-memory simulated radio.
//!
//! A [`SimAir`] is a shared medium. Every [`SimRadio`] created from it can
//! become discoverable, listen on a service, discover the others and connect
//! to them. Connected channels are in-process duplex pipes, so two session
//! managers in one test can talk to each other exactly as two devices would.
//!
//! Failure injection:
//! - [`SimRadio::set_enabled`] switches the adapter off
//! - [`SimAir::set_unresponsive`] makes connects to an address hang forever
//! - [`SimRadio::fail_next_read`] and [`SimRadio::fail_next_write`] break
//!   the next read or write on a channel handed out by that radio
//! - connecting to an address with no listener fails as unreachable, and to
//!   a listener on another service as service-not-offered
//!
//! Each radio counts the channels it handed out and the closes performed on
//! them, so tests can assert that nothing was leaked or closed twice.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use bluechat_core::{PeerAddress, PeerIdentity, ServiceRecord};

use crate::{Channel, DiscoverySink, Listener, Radio, RadioError};

/// Buffer size of each direction of a simulated pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

// ============================================================================
// Shared Medium
// ============================================================================

/// The shared medium simulated radios live on. Cheap to clone.
#[derive(Clone, Default)]
pub struct SimAir {
    inner: Arc<Mutex<AirState>>,
}

#[derive(Default)]
struct AirState {
    /// Registered services, keyed by (host address, service id)
    listeners: HashMap<(PeerAddress, Uuid), ListenerSlot>,

    /// Devices currently discoverable and until when
    visible: HashMap<PeerAddress, (PeerIdentity, Instant)>,

    /// Active scans, keyed by the scanning device
    scanners: HashMap<PeerAddress, DiscoverySink>,

    /// Addresses whose connects never complete
    unresponsive: HashSet<PeerAddress>,
}

struct ListenerSlot {
    host: PeerIdentity,
    incoming: mpsc::UnboundedSender<SimChannel>,
}

impl SimAir {
    /// Creates an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a radio on this medium with the given identity.
    pub fn radio(&self, identity: PeerIdentity) -> SimRadio {
        SimRadio {
            air: self.clone(),
            identity,
            enabled: AtomicBool::new(true),
            paired: Mutex::new(Vec::new()),
            scripted: Mutex::new(Vec::new()),
            stats: Arc::new(ChannelStats::default()),
            discovery_starts: AtomicUsize::new(0),
        }
    }

    /// Makes every connect to `address` hang until the caller gives up.
    pub fn set_unresponsive(&self, address: impl Into<PeerAddress>) {
        self.lock().unresponsive.insert(address.into());
    }

    fn lock(&self) -> MutexGuard<'_, AirState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Channel Accounting
// ============================================================================

#[derive(Debug, Default)]
struct ChannelStats {
    /// Channels handed to the owner (accepted or connected)
    opened: AtomicUsize,
    /// Channels that performed their one real close
    closed: AtomicUsize,
    /// Every call to `close()`, including no-op repeats
    close_calls: AtomicUsize,
    /// Pending injected write failures
    write_faults: AtomicUsize,
    /// Holds a permit per injected read failure; wakes a read in progress
    read_faults: Notify,
}

impl ChannelStats {
    fn take_write_fault(&self) -> bool {
        self.write_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

// ============================================================================
// Simulated Radio
// ============================================================================

/// A simulated radio adapter on a [`SimAir`].
pub struct SimRadio {
    air: SimAir,
    identity: PeerIdentity,
    enabled: AtomicBool,
    paired: Mutex<Vec<PeerIdentity>>,
    scripted: Mutex<Vec<PeerIdentity>>,
    stats: Arc<ChannelStats>,
    discovery_starts: AtomicUsize,
}

impl SimRadio {
    /// This device's identity as other radios see it.
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Switches the adapter on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Adds a bonded device reported by `paired_peers`.
    pub fn add_paired(&self, peer: PeerIdentity) {
        lock(&self.paired).push(peer);
    }

    /// Adds a sighting reported at the start of every scan, in addition to
    /// the discoverable radios on the medium.
    pub fn script_discovery(&self, peer: PeerIdentity) {
        lock(&self.scripted).push(peer);
    }

    /// Channels handed out by this radio that have not been closed.
    pub fn open_channels(&self) -> usize {
        let opened = self.stats.opened.load(Ordering::SeqCst);
        opened.saturating_sub(self.stats.closed.load(Ordering::SeqCst))
    }

    /// Total `close()` calls on channels handed out by this radio.
    pub fn close_calls(&self) -> usize {
        self.stats.close_calls.load(Ordering::SeqCst)
    }

    /// Number of times discovery was started.
    pub fn discovery_starts(&self) -> usize {
        self.discovery_starts.load(Ordering::SeqCst)
    }

    /// Returns true while a scan from this radio is registered.
    pub fn is_discovering(&self) -> bool {
        self.air.lock().scanners.contains_key(&self.identity.address)
    }

    /// Returns true while this radio is in a discoverability window.
    pub fn is_discoverable(&self) -> bool {
        self.air
            .lock()
            .visible
            .get(&self.identity.address)
            .is_some_and(|(_, until)| *until > Instant::now())
    }

    /// Fails the next read on a channel handed out by this radio, including
    /// a read already waiting for data.
    pub fn fail_next_read(&self) {
        self.stats.read_faults.notify_one();
    }

    /// Fails the next write on a channel handed out by this radio.
    pub fn fail_next_write(&self) {
        self.stats.write_faults.fetch_add(1, Ordering::SeqCst);
    }

    fn ensure_enabled(&self) -> Result<(), RadioError> {
        if self.enabled.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RadioError::Disabled)
        }
    }
}

#[async_trait]
impl Radio for SimRadio {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn paired_peers(&self) -> Result<Vec<PeerIdentity>, RadioError> {
        self.ensure_enabled()?;
        Ok(lock(&self.paired).clone())
    }

    async fn start_discovery(&self, sink: DiscoverySink) -> Result<(), RadioError> {
        self.ensure_enabled()?;
        self.discovery_starts.fetch_add(1, Ordering::SeqCst);

        for peer in lock(&self.scripted).iter() {
            let _ = sink.send(peer.clone());
        }

        let now = Instant::now();
        let mut air = self.air.lock();
        for (address, (peer, until)) in &air.visible {
            if *address != self.identity.address && *until > now {
                let _ = sink.send(peer.clone());
            }
        }
        air.scanners.insert(self.identity.address.clone(), sink);

        debug!(radio = %self.identity.address, "Simulated discovery started");
        Ok(())
    }

    async fn cancel_discovery(&self) -> Result<(), RadioError> {
        self.air.lock().scanners.remove(&self.identity.address);
        Ok(())
    }

    async fn make_discoverable(&self, duration: Duration) -> Result<(), RadioError> {
        self.ensure_enabled()?;
        let mut air = self.air.lock();
        air.visible.insert(
            self.identity.address.clone(),
            (self.identity.clone(), Instant::now() + duration),
        );

        // Running scans see the new device immediately
        let me = self.identity.clone();
        air.scanners
            .retain(|scanner, sink| *scanner == me.address || sink.send(me.clone()).is_ok());
        Ok(())
    }

    async fn cancel_discoverable(&self) -> Result<(), RadioError> {
        if self.air.lock().visible.remove(&self.identity.address).is_some() {
            debug!(radio = %self.identity.address, "Simulated device no longer discoverable");
        }
        Ok(())
    }

    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn Listener>, RadioError> {
        self.ensure_enabled()?;
        let key = (self.identity.address.clone(), service.id);
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut air = self.air.lock();
            if air.listeners.contains_key(&key) {
                return Err(RadioError::Io(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("service {} already registered", service.id),
                )));
            }
            air.listeners.insert(
                key.clone(),
                ListenerSlot {
                    host: self.identity.clone(),
                    incoming: tx,
                },
            );
        }

        debug!(radio = %self.identity.address, service = %service, "Simulated listener registered");
        Ok(Box::new(SimListener {
            air: self.air.clone(),
            key,
            incoming: AsyncMutex::new(rx),
            stats: Arc::clone(&self.stats),
            closed: AtomicBool::new(false),
        }))
    }

    async fn connect(
        &self,
        peer: &PeerIdentity,
        service: &ServiceRecord,
    ) -> Result<Box<dyn Channel>, RadioError> {
        self.ensure_enabled()?;

        if self.air.lock().unresponsive.contains(&peer.address) {
            debug!(peer = %peer.address, "Simulated peer never answers");
            return std::future::pending().await;
        }

        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        let key = (peer.address.clone(), service.id);

        let host = {
            let mut air = self.air.lock();
            let delivered = air.listeners.get(&key).map(|slot| {
                // Far end is stamped with the host's stats when accepted
                let server_side = SimChannel::new(self.identity.clone(), far, None);
                (slot.incoming.send(server_side).is_ok(), slot.host.clone())
            });

            match delivered {
                Some((true, host)) => host,
                Some((false, _)) => {
                    air.listeners.remove(&key);
                    return Err(RadioError::Unreachable(peer.address.clone()));
                }
                None => {
                    let offers_other = air.listeners.keys().any(|(addr, _)| *addr == peer.address);
                    return Err(if offers_other {
                        RadioError::ServiceNotOffered {
                            peer: peer.address.clone(),
                            service: service.id,
                        }
                    } else {
                        RadioError::Unreachable(peer.address.clone())
                    });
                }
            }
        };

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimChannel::new(
            host,
            near,
            Some(Arc::clone(&self.stats)),
        )))
    }
}

// ============================================================================
// Simulated Listener
// ============================================================================

/// Listening endpoint registered on the medium.
pub struct SimListener {
    air: SimAir,
    key: (PeerAddress, Uuid),
    incoming: AsyncMutex<mpsc::UnboundedReceiver<SimChannel>>,
    stats: Arc<ChannelStats>,
    closed: AtomicBool,
}

impl SimListener {
    fn unregister(&self) {
        self.air.lock().listeners.remove(&self.key);
    }
}

#[async_trait]
impl Listener for SimListener {
    async fn accept(&self) -> Result<Box<dyn Channel>, RadioError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RadioError::ListenerClosed);
        }

        // Unregistering drops the sender, which ends this wait
        match self.incoming.lock().await.recv().await {
            Some(mut channel) => {
                self.stats.opened.fetch_add(1, Ordering::SeqCst);
                channel.stats = Some(Arc::clone(&self.stats));
                Ok(Box::new(channel))
            }
            None => Err(RadioError::ListenerClosed),
        }
    }

    async fn close(&self) -> Result<(), RadioError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.unregister();
        }
        Ok(())
    }
}

impl Drop for SimListener {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.unregister();
        }
    }
}

// ============================================================================
// Simulated Channel
// ============================================================================

/// One end of an in-process duplex pipe.
pub struct SimChannel {
    peer: PeerIdentity,
    reader: AsyncMutex<ReadHalf<DuplexStream>>,
    writer: AsyncMutex<WriteHalf<DuplexStream>>,
    closed: AtomicBool,
    stats: Option<Arc<ChannelStats>>,
}

impl SimChannel {
    fn new(peer: PeerIdentity, stream: DuplexStream, stats: Option<Arc<ChannelStats>>) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            peer,
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            closed: AtomicBool::new(false),
            stats,
        }
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::NotConnected, "channel closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Channel for SimChannel {
    fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let mut reader = self.reader.lock().await;
        let Some(stats) = &self.stats else {
            return reader.read(buf).await;
        };

        tokio::select! {
            biased;
            _ = stats.read_faults.notified() => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "injected read fault",
            )),
            read = reader.read(buf) => read,
        }
    }

    async fn write(&self, buf: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        if self.stats.as_ref().is_some_and(|stats| stats.take_write_fault()) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write fault",
            ));
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await
    }

    async fn close(&self) -> io::Result<()> {
        if let Some(stats) = &self.stats {
            stats.close_calls.fetch_add(1, Ordering::SeqCst);
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(stats) = &self.stats {
            stats.closed.fetch_add(1, Ordering::SeqCst);
        }

        // Remote reads see end-of-stream once our write side shuts down
        let _ = self.writer.lock().await.shutdown().await;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
