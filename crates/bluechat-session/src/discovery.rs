//! Discovery controller - advertising for the host role, scanning for the
//! join role.
//!
//! Platform discovery callbacks are delivered into an unbounded queue. One
//! pump task drains it and is the only writer of the [`DeviceRegistry`]
//! while a scan runs; it also publishes `PeerDiscovered` the first time an
//! address is seen. The pump holds results back until the [`ScanGate`]
//! returned by `start_scanning` is dropped, so the caller can announce the
//! scan first.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Event sends ignore the no-subscriber case
//! - Radio failures are mapped into the session error taxonomy
//!
//! [`DeviceRegistry`]: crate::registry::DeviceRegistry

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bluechat_core::{PeerIdentity, ServiceRecord, SessionError, SessionEvent, SessionResult};
use bluechat_radio::{Listener, Permissions, Radio};

use crate::registry::SharedRegistry;

/// How long `stop()` waits for the pump to drain before aborting it.
const PUMP_STOP_GRACE: Duration = Duration::from_millis(250);

/// A running scan.
struct ScanTask {
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

/// Holds back discovery results of a scan that has just started.
///
/// Results reach the registry and the event stream once this is dropped.
#[derive(Debug)]
pub struct ScanGate {
    _release: oneshot::Sender<()>,
}

/// Starts and stops advertising and scanning on behalf of a session.
pub struct DiscoveryController {
    radio: Arc<dyn Radio>,
    permissions: Arc<dyn Permissions>,
    registry: SharedRegistry,
    events: broadcast::Sender<SessionEvent>,
    discoverable_for: Duration,
    scan: Option<ScanTask>,
    advertising: bool,
}

impl DiscoveryController {
    /// Creates a controller.
    ///
    /// # Arguments
    ///
    /// * `radio` - The radio capability
    /// * `permissions` - The permission capability
    /// * `registry` - Registry filled while scanning
    /// * `events` - Where `PeerDiscovered` is published
    /// * `discoverable_for` - Discoverability window for the host role
    pub fn new(
        radio: Arc<dyn Radio>,
        permissions: Arc<dyn Permissions>,
        registry: SharedRegistry,
        events: broadcast::Sender<SessionEvent>,
        discoverable_for: Duration,
    ) -> Self {
        Self {
            radio,
            permissions,
            registry,
            events,
            discoverable_for,
            scan: None,
            advertising: false,
        }
    }

    /// Checks that radio operations may run.
    ///
    /// Missing permissions are requested once before giving up.
    ///
    /// # Errors
    ///
    /// - `SessionError::PermissionDenied` if authorization is still absent
    /// - `SessionError::RadioUnavailable` if the adapter is off
    async fn check_preconditions(&self) -> SessionResult<()> {
        if !self.permissions.has_required_permissions() {
            debug!("Radio permissions missing, requesting");
            if !self.permissions.request_permissions().await {
                warn!("Radio permissions denied");
                return Err(SessionError::PermissionDenied);
            }
        }
        if !self.radio.is_enabled() {
            warn!("Radio is disabled");
            return Err(SessionError::RadioUnavailable);
        }
        Ok(())
    }

    /// Makes the device discoverable and opens a listening endpoint on
    /// `service`.
    ///
    /// Discoverability lasts until the window runs out or `stop()` is
    /// called.
    pub async fn start_listening(
        &mut self,
        service: &ServiceRecord,
    ) -> SessionResult<Box<dyn Listener>> {
        self.check_preconditions().await?;

        self.radio
            .make_discoverable(self.discoverable_for)
            .await
            .map_err(|e| e.into_session(SessionError::DiscoveryFailed))?;
        self.advertising = true;

        let listener = match self.radio.listen(service).await {
            Ok(listener) => listener,
            Err(e) => {
                self.stop_advertising().await;
                return Err(e.into_session(SessionError::AcceptFailed));
            }
        };

        info!(
            service = %service,
            discoverable_secs = self.discoverable_for.as_secs(),
            "Listening for a joiner"
        );
        Ok(listener)
    }

    /// Starts a fresh scan.
    ///
    /// Clears the registry, seeds it with paired peers, then feeds it with
    /// discovery results. A scan already in progress is stopped first.
    /// Results are held until the returned gate is dropped.
    ///
    /// # Errors
    ///
    /// - `SessionError::PermissionDenied` if authorization is absent after
    ///   one request
    /// - `SessionError::RadioUnavailable` if the adapter is off
    /// - `SessionError::DiscoveryFailed` if the radio cannot scan
    pub async fn start_scanning(&mut self) -> SessionResult<ScanGate> {
        self.stop().await;
        self.check_preconditions().await?;

        let paired = self
            .radio
            .paired_peers()
            .await
            .map_err(|e| e.into_session(SessionError::DiscoveryFailed))?;

        self.registry.write().await.clear();

        let (sink, queue) = mpsc::unbounded_channel();
        let (release, gate) = oneshot::channel();
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(run_pump(
            queue,
            gate,
            Arc::clone(&self.registry),
            self.events.clone(),
            cancel.clone(),
        ));

        // Paired peers go through the pump ahead of any sighting
        let paired_count = paired.len();
        for peer in paired {
            let _ = sink.send(peer);
        }

        if let Err(e) = self.radio.start_discovery(sink).await {
            cancel.cancel();
            let _ = timeout(PUMP_STOP_GRACE, pump).await;
            return Err(e.into_session(SessionError::DiscoveryFailed));
        }

        info!(paired = paired_count, "Scanning for peers");
        self.scan = Some(ScanTask { cancel, pump });
        Ok(ScanGate { _release: release })
    }

    /// Ends advertising and scanning, whichever is active. Idempotent.
    pub async fn stop(&mut self) {
        self.stop_advertising().await;
        self.stop_scanning().await;
    }

    async fn stop_advertising(&mut self) {
        if !std::mem::take(&mut self.advertising) {
            return;
        }
        match self.radio.cancel_discoverable().await {
            Ok(()) => debug!("Advertising stopped"),
            Err(e) => warn!(error = %e, "Failed to end discoverability"),
        }
    }

    async fn stop_scanning(&mut self) {
        let Some(scan) = self.scan.take() else {
            return;
        };

        if let Err(e) = self.radio.cancel_discovery().await {
            warn!(error = %e, "Failed to cancel discovery");
        }
        scan.cancel.cancel();

        let mut pump = scan.pump;
        if timeout(PUMP_STOP_GRACE, &mut pump).await.is_err() {
            pump.abort();
        }
        debug!("Scan stopped");
    }

    /// Returns true while a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    /// Returns true while the device is advertised to scanners.
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }
}

/// Drains discovery results into the registry until cancelled or the radio
/// drops its sink.
async fn run_pump(
    mut queue: mpsc::UnboundedReceiver<PeerIdentity>,
    gate: oneshot::Receiver<()>,
    registry: SharedRegistry,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    // The gate opens when its sender is dropped
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = gate => {}
    }

    loop {
        let peer = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(peer) => peer,
                None => break,
            },
        };

        let is_new = registry.write().await.add(peer.clone());
        if is_new {
            debug!(peer = %peer, "Peer discovered");
            let _ = events.send(SessionEvent::PeerDiscovered { peer });
        }
    }
}
