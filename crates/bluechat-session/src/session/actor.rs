//! Session actor - owns the state machine, the endpoint and every
//! background activity of one session.
//!
//! Commands are processed one at a time. Accept/connect, the read loop and
//! the writer run as separate tasks and report back through the same queue,
//! tagged with the attempt generation that spawned them. Completions from an
//! older generation are discarded, and any channel they carry is closed.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply and event send failures are ignored (the caller may be gone)
//! - Background tasks are joined with a bounded wait, then aborted

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bluechat_core::{
    ChatMessage, PeerIdentity, Role, ServiceRecord, SessionError, SessionEvent, SessionResult,
    SessionState,
};
use bluechat_radio::{Channel, Listener, Permissions, Radio};

use crate::config::SessionConfig;
use crate::discovery::DiscoveryController;
use crate::endpoint::TransportEndpoint;
use crate::read_loop::spawn_read_loop;
use crate::registry::SharedRegistry;

use super::commands::{report, ReadEnd, SessionCommand};
use super::writer::spawn_writer;

/// How long teardown waits for a background task before aborting it.
const TASK_JOIN_GRACE: Duration = Duration::from_millis(500);

// ============================================================================
// Background Activities
// ============================================================================

/// The accept (host) or connect (join) attempt in flight.
struct PendingAttempt {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything that exists only while connected.
struct ActiveLink {
    endpoint: Arc<TransportEndpoint>,
    cancel: CancellationToken,
    read_loop: JoinHandle<()>,
    writer: JoinHandle<()>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

// ============================================================================
// Session Actor
// ============================================================================

/// The session actor.
///
/// # Ownership
///
/// The actor owns:
/// - `state` and `role`: the state machine
/// - `link`: the one endpoint, read loop and writer while connected
/// - `pending`: the one accept or connect attempt while advertising or
///   connecting
///
/// The registry is shared with the discovery pump and with handles, which
/// read it directly.
pub(crate) struct SessionActor {
    /// Command receiver
    receiver: mpsc::Receiver<SessionCommand>,

    /// Handed to background tasks; weak so handles alone keep the actor alive
    commands: mpsc::WeakSender<SessionCommand>,

    /// Event publisher for UI collaborators
    event_publisher: broadcast::Sender<SessionEvent>,

    radio: Arc<dyn Radio>,
    discovery: DiscoveryController,
    registry: SharedRegistry,
    config: SessionConfig,
    service: ServiceRecord,

    state: SessionState,
    role: Role,

    /// Generation of the current attempt; bumped on role selection and close
    attempt: u64,

    pending: Option<PendingAttempt>,
    link: Option<ActiveLink>,
}

impl SessionActor {
    /// Creates a new session actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `commands` - Weak sender given to background tasks
    /// * `event_publisher` - Broadcast channel for publishing events
    /// * `radio` - Radio capability
    /// * `permissions` - Permission capability
    /// * `registry` - Registry filled while scanning
    /// * `config` - Session tunables
    pub(crate) fn new(
        receiver: mpsc::Receiver<SessionCommand>,
        commands: mpsc::WeakSender<SessionCommand>,
        event_publisher: broadcast::Sender<SessionEvent>,
        radio: Arc<dyn Radio>,
        permissions: Arc<dyn Permissions>,
        registry: SharedRegistry,
        config: SessionConfig,
    ) -> Self {
        let discovery = DiscoveryController::new(
            Arc::clone(&radio),
            permissions,
            Arc::clone(&registry),
            event_publisher.clone(),
            config.discoverable_duration(),
        );
        let service = config.service();

        Self {
            receiver,
            commands,
            event_publisher,
            radio,
            discovery,
            registry,
            config,
            service,
            state: SessionState::Idle,
            role: Role::Unselected,
            attempt: 0,
            pending: None,
            link: None,
        }
    }

    /// Runs the actor until every handle is dropped, then tears down.
    pub(crate) async fn run(mut self) {
        info!(service = %self.service, "Session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        self.handle_close().await;
        info!("Session actor stopped, all handles dropped");
    }

    /// Dispatches a single command.
    pub(crate) async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::SelectRole { role, respond_to } => {
                let result = self.handle_select_role(role).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::SelectPeer { peer, respond_to } => {
                let result = self.handle_select_peer(peer).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Send {
                payload,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_send(payload));
            }
            SessionCommand::Close { respond_to } => {
                self.handle_close().await;
                let _ = respond_to.send(());
            }
            SessionCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }
            SessionCommand::GetRole { respond_to } => {
                let _ = respond_to.send(self.role);
            }
            SessionCommand::Established { attempt, result } => {
                self.handle_established(attempt, result).await;
            }
            SessionCommand::Inbound { attempt, message } => {
                self.handle_inbound(attempt, message);
            }
            SessionCommand::ReadLoopEnded { attempt, end } => {
                self.handle_read_loop_ended(attempt, end).await;
            }
            SessionCommand::WriteFailed { attempt, error } => {
                self.handle_write_failed(attempt, error).await;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    async fn handle_select_role(&mut self, role: Role) -> SessionResult<()> {
        if !self.state.accepts_role_selection() {
            debug!(role = role.label(), state = %self.state, "Rejecting role selection");
            return Err(SessionError::invalid_state("select a role", &self.state));
        }
        if role == Role::Unselected {
            return Err(SessionError::invalid_state(
                "select the unselected role",
                &self.state,
            ));
        }

        self.attempt += 1;
        self.role = role;
        self.registry.write().await.clear();
        info!(role = role.label(), attempt = self.attempt, "Role selected");

        let started = if role == Role::Host {
            self.start_host().await
        } else {
            self.start_join().await
        };

        if let Err(reason) = &started {
            self.fail(reason.clone());
        }
        started
    }

    async fn start_host(&mut self) -> SessionResult<()> {
        let listener = self.discovery.start_listening(&self.service).await?;
        self.transition(SessionState::Advertising);
        self.spawn_accept(listener);
        Ok(())
    }

    async fn start_join(&mut self) -> SessionResult<()> {
        let gate = self.discovery.start_scanning().await?;
        // Announce the scan before its first result
        self.transition(SessionState::Scanning);
        drop(gate);
        Ok(())
    }

    async fn handle_select_peer(&mut self, peer: PeerIdentity) -> SessionResult<()> {
        if self.state != SessionState::Scanning {
            return Err(SessionError::invalid_state("select a peer", &self.state));
        }

        self.discovery.stop().await;
        self.registry.write().await.clear();

        info!(peer = %peer, attempt = self.attempt, "Peer selected");
        self.transition(SessionState::Connecting);
        self.spawn_connect(peer);
        Ok(())
    }

    fn handle_send(&mut self, payload: Vec<u8>) -> SessionResult<ChatMessage> {
        let link = match (&self.state, &self.link) {
            (SessionState::Connected, Some(link)) => link,
            _ => return Err(SessionError::NotConnected),
        };

        if link.outbound.send(payload.clone()).is_err() {
            // Writer already stopped; its failure report is queued
            return Err(SessionError::NotConnected);
        }

        let message = ChatMessage::sent(payload);
        let _ = self.event_publisher.send(SessionEvent::MessageSent {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Cancels everything and rests in `Closed`. Safe to repeat.
    async fn handle_close(&mut self) {
        self.attempt += 1;
        self.discovery.stop().await;

        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            join_within(pending.task).await;
        }

        self.teardown_link().await;
        self.registry.write().await.clear();
        self.role = Role::Unselected;
        self.transition(SessionState::Closed);
    }

    // ------------------------------------------------------------------------
    // Background completions
    // ------------------------------------------------------------------------

    async fn handle_established(
        &mut self,
        attempt: u64,
        result: SessionResult<Box<dyn Channel>>,
    ) {
        let awaiting = matches!(
            self.state,
            SessionState::Advertising | SessionState::Connecting
        );
        if attempt != self.attempt || !awaiting {
            debug!(
                attempt,
                current = self.attempt,
                "Discarding stale connection attempt"
            );
            if let Ok(channel) = result {
                let _ = channel.close().await;
            }
            return;
        }

        // The attempt task has finished
        self.pending = None;

        match result {
            Ok(channel) => self.start_link(channel),
            Err(reason) => self.fail(reason),
        }
    }

    fn handle_inbound(&mut self, attempt: u64, message: ChatMessage) {
        if attempt != self.attempt || self.link.is_none() {
            debug!(attempt, "Discarding chunk from a finished session");
            return;
        }
        let _ = self
            .event_publisher
            .send(SessionEvent::MessageReceived { message });
    }

    async fn handle_read_loop_ended(&mut self, attempt: u64, end: ReadEnd) {
        if attempt != self.attempt || self.link.is_none() {
            return;
        }

        self.teardown_link().await;
        match end {
            ReadEnd::Eof => {
                info!("Remote side closed the session");
                self.discovery.stop().await;
                self.role = Role::Unselected;
                self.transition(SessionState::Closed);
            }
            ReadEnd::Error(error) => self.fail(SessionError::io(error)),
        }
    }

    async fn handle_write_failed(&mut self, attempt: u64, error: String) {
        if attempt != self.attempt || self.link.is_none() {
            return;
        }
        self.teardown_link().await;
        self.fail(SessionError::io(error));
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn spawn_accept(&mut self, listener: Box<dyn Listener>) {
        let attempt = self.attempt;
        let commands = self.commands.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let accepted = tokio::select! {
                _ = token.cancelled() => None,
                accepted = listener.accept() => Some(accepted),
            };

            // One joiner per listen
            if let Err(e) = listener.close().await {
                debug!(error = %e, "Listener close failed");
            }

            if let Some(accepted) = accepted {
                let result = accepted.map_err(|e| e.into_session(SessionError::AcceptFailed));
                report(&commands, SessionCommand::Established { attempt, result }).await;
            }
        });

        self.pending = Some(PendingAttempt { cancel, task });
    }

    fn spawn_connect(&mut self, peer: PeerIdentity) {
        let attempt = self.attempt;
        let commands = self.commands.clone();
        let radio = Arc::clone(&self.radio);
        let service = self.service.clone();
        let limit = self.config.connect_timeout();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let connected = tokio::select! {
                _ = token.cancelled() => return,
                connected = timeout(limit, radio.connect(&peer, &service)) => connected,
            };

            let result = match connected {
                Ok(Ok(channel)) => Ok(channel),
                Ok(Err(e)) => Err(e.into_session(SessionError::ConnectFailed)),
                Err(_) => Err(SessionError::ConnectFailed(format!(
                    "no answer from {} within {} ms",
                    peer.address,
                    limit.as_millis()
                ))),
            };
            report(&commands, SessionCommand::Established { attempt, result }).await;
        });

        self.pending = Some(PendingAttempt { cancel, task });
    }

    fn start_link(&mut self, channel: Box<dyn Channel>) {
        let endpoint = Arc::new(TransportEndpoint::new(channel));
        let cancel = CancellationToken::new();

        let read_loop = spawn_read_loop(
            Arc::clone(&endpoint),
            self.config.read_chunk_size,
            self.attempt,
            self.commands.clone(),
            cancel.clone(),
        );
        let (outbound, writer) = spawn_writer(
            Arc::clone(&endpoint),
            self.attempt,
            self.commands.clone(),
            cancel.clone(),
        );

        info!(
            peer = %endpoint.peer(),
            role = self.role.label(),
            attempt = self.attempt,
            "Connected"
        );

        self.link = Some(ActiveLink {
            endpoint,
            cancel,
            read_loop,
            writer,
            outbound,
        });
        self.transition(SessionState::Connected);
    }

    /// Stops the read loop and writer, then closes the endpoint.
    async fn teardown_link(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        let ActiveLink {
            endpoint,
            cancel,
            read_loop,
            writer,
            outbound,
        } = link;

        cancel.cancel();
        drop(outbound);
        join_within(read_loop).await;
        join_within(writer).await;

        if let Err(e) = endpoint.close().await {
            debug!(error = %e, "Endpoint close failed");
        }
    }

    fn fail(&mut self, reason: SessionError) {
        warn!(reason = %reason, role = self.role.label(), "Session failed");
        self.transition(SessionState::Failed(reason));
    }

    /// Moves to `next`, publishing `StateChanged` only on an actual change.
    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        info!(from = %self.state, to = %next, "Session state changed");
        self.state = next.clone();
        let _ = self
            .event_publisher
            .send(SessionEvent::StateChanged { state: next });
    }

    // ------------------------------------------------------------------------
    // Accessors (used in tests)
    // ------------------------------------------------------------------------

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn role(&self) -> Role {
        self.role
    }
}

/// Waits for a background task, aborting it after the grace period.
async fn join_within(mut task: JoinHandle<()>) {
    if timeout(TASK_JOIN_GRACE, &mut task).await.is_err() {
        warn!("Background task did not stop in time, aborting");
        task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeviceRegistry;
    use bluechat_radio::sim::{SimAir, SimRadio};
    use bluechat_radio::StaticPermissions;
    use tokio::sync::oneshot;

    struct Fixture {
        _cmd_tx: mpsc::Sender<SessionCommand>,
        actor: SessionActor,
        events: broadcast::Receiver<SessionEvent>,
        air: SimAir,
        radio: Arc<SimRadio>,
    }

    fn create_actor() -> Fixture {
        let air = SimAir::new();
        let radio = Arc::new(air.radio(PeerIdentity::new("00:01", "local")));
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, events) = broadcast::channel(16);
        let actor = SessionActor::new(
            cmd_rx,
            cmd_tx.downgrade(),
            event_tx,
            radio.clone(),
            Arc::new(StaticPermissions::granted()),
            DeviceRegistry::shared(),
            SessionConfig::default(),
        );
        Fixture {
            _cmd_tx: cmd_tx,
            actor,
            events,
            air,
            radio,
        }
    }

    async fn select_role(actor: &mut SessionActor, role: Role) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        actor
            .handle_command(SessionCommand::SelectRole {
                role,
                respond_to: tx,
            })
            .await;
        rx.await.unwrap()
    }

    async fn close(actor: &mut SessionActor) {
        let (tx, rx) = oneshot::channel();
        actor
            .handle_command(SessionCommand::Close { respond_to: tx })
            .await;
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_select_role_host_advertises() {
        let mut fx = create_actor();

        select_role(&mut fx.actor, Role::Host).await.unwrap();

        assert_eq!(fx.actor.state(), &SessionState::Advertising);
        assert_eq!(fx.actor.role(), Role::Host);
        let event = fx.events.try_recv().unwrap();
        assert_eq!(event.state(), Some(&SessionState::Advertising));

        close(&mut fx.actor).await;
    }

    #[tokio::test]
    async fn test_select_role_twice_fails() {
        let mut fx = create_actor();

        select_role(&mut fx.actor, Role::Join).await.unwrap();
        let err = select_role(&mut fx.actor, Role::Host).await.unwrap_err();

        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(fx.actor.role(), Role::Join);
        assert_eq!(fx.actor.state(), &SessionState::Scanning);

        close(&mut fx.actor).await;
    }

    #[tokio::test]
    async fn test_select_unselected_role_rejected() {
        let mut fx = create_actor();
        let err = select_role(&mut fx.actor, Role::Unselected)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(fx.actor.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn test_send_before_connected() {
        let mut fx = create_actor();
        let (tx, rx) = oneshot::channel();
        fx.actor
            .handle_command(SessionCommand::Send {
                payload: b"hi".to_vec(),
                respond_to: tx,
            })
            .await;
        assert_eq!(rx.await.unwrap().unwrap_err(), SessionError::NotConnected);
        assert!(fx.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut fx = create_actor();

        close(&mut fx.actor).await;
        close(&mut fx.actor).await;

        assert_eq!(fx.actor.state(), &SessionState::Closed);
        let event = fx.events.try_recv().unwrap();
        assert_eq!(event.state(), Some(&SessionState::Closed));
        assert!(fx.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_select_peer_requires_scanning() {
        let mut fx = create_actor();
        let (tx, rx) = oneshot::channel();
        fx.actor
            .handle_command(SessionCommand::SelectPeer {
                peer: PeerIdentity::unnamed("AA"),
                respond_to: tx,
            })
            .await;
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidState {
                operation: "select a peer".to_string(),
                state: "idle".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_stale_completion_closes_channel() {
        let mut fx = create_actor();
        let host = fx.air.radio(PeerIdentity::unnamed("AA"));
        let service = ServiceRecord::default();
        let _listener = host.listen(&service).await.unwrap();
        let channel = fx.radio.connect(host.identity(), &service).await.unwrap();

        fx.actor
            .handle_command(SessionCommand::Established {
                attempt: 42,
                result: Ok(channel),
            })
            .await;

        assert_eq!(fx.actor.state(), &SessionState::Idle);
        assert_eq!(fx.radio.close_calls(), 1);
        assert_eq!(fx.radio.open_channels(), 0);
    }

    #[tokio::test]
    async fn test_failed_attempt_moves_to_failed() {
        let mut fx = create_actor();
        select_role(&mut fx.actor, Role::Host).await.unwrap();
        let attempt = fx.actor.attempt;

        fx.actor
            .handle_command(SessionCommand::Established {
                attempt,
                result: Err(SessionError::AcceptFailed("listener closed".to_string())),
            })
            .await;

        assert_eq!(
            fx.actor.state().failure(),
            Some(&SessionError::AcceptFailed("listener closed".to_string()))
        );
        // Failed only leaves through close
        assert!(select_role(&mut fx.actor, Role::Join).await.is_err());
        close(&mut fx.actor).await;
        assert_eq!(fx.actor.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn test_restart_from_closed() {
        let mut fx = create_actor();

        select_role(&mut fx.actor, Role::Host).await.unwrap();
        close(&mut fx.actor).await;
        assert_eq!(fx.actor.role(), Role::Unselected);

        select_role(&mut fx.actor, Role::Host).await.unwrap();
        assert_eq!(fx.actor.state(), &SessionState::Advertising);
        close(&mut fx.actor).await;
    }
}
