//! The interactive chat loop and the peer listing.
//!
//! The loop multiplexes three sources: session events, input lines and a
//! cancellation token (Ctrl+C). Input and output are generic so the loop
//! can be driven from tests.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bluechat_core::{PeerIdentity, Role, SessionEvent, SessionState};
use bluechat_radio::Radio;
use bluechat_session::{DeviceRegistry, SessionHandle};

use crate::app::ChatView;
use crate::error::CliError;
use crate::input::{parse_line, Action, HELP};

/// How the chat loop starts and prints.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Role to select on start
    pub role: Role,

    /// Peer to connect to as soon as scanning starts (join only)
    pub peer: Option<PeerIdentity>,

    /// Print events as JSON lines instead of text
    pub json: bool,
}

// ============================================================================
// Chat Loop
// ============================================================================

/// Runs one chat session until it closes, fails, input ends or `cancel`
/// fires. The session is closed on return.
///
/// # Errors
///
/// Returns an error if the role cannot be selected, if the session fails,
/// or if writing to `out` fails.
pub async fn run_chat<R, W>(
    session: &SessionHandle,
    options: ChatOptions,
    input: R,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = session.subscribe();
    let mut lines = input.lines();
    let mut view = ChatView::new();
    let mut pending_peer = options.peer.clone();

    session
        .select_role(options.role)
        .await
        .with_context(|| format!("could not start as {}", options.role.label()))?;
    info!(role = options.role.label(), json = options.json, "Chat started");

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Chat interrupted");
                break Ok(());
            }

            event = events.recv() => match event {
                Ok(event) => {
                    print_event(out, &mut view, &event, options.json)?;

                    if view.state == SessionState::Scanning {
                        if let Some(peer) = pending_peer.take() {
                            if let Err(e) = session.select_peer(peer).await {
                                writeln!(out, "! {e}")?;
                            }
                        }
                    }

                    if view.is_finished() {
                        break match view.state.failure() {
                            Some(reason) => Err(anyhow!("session failed: {reason}")),
                            None => Ok(()),
                        };
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged, some events were dropped");
                }
                Err(RecvError::Closed) => break Ok(()),
            },

            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if handle_line(session, &view, &line, out).await? {
                        info!("User requested quit");
                        break Ok(());
                    }
                }
                Ok(None) => {
                    debug!("Input closed");
                    break Ok(());
                }
                Err(e) => break Err(CliError::Io(e).into()),
            },
        }
    };

    if let Err(e) = session.close().await {
        debug!(error = %e, "Session already gone at exit");
    }
    outcome
}

/// Handles one input line. Returns true if the user asked to quit.
async fn handle_line<W: Write>(
    session: &SessionHandle,
    view: &ChatView,
    line: &str,
    out: &mut W,
) -> Result<bool> {
    match parse_line(line) {
        Ok(Action::None) => {}
        Ok(Action::Quit) => return Ok(true),
        Ok(Action::Send(text)) => {
            if let Err(e) = session.send(text).await {
                writeln!(out, "! {e}")?;
            }
        }
        Ok(Action::ListPeers) => {
            for line in view.peer_lines() {
                writeln!(out, "{line}")?;
            }
        }
        Ok(Action::Connect(index)) => match session.peers().await.get(index) {
            Some(peer) => {
                if let Err(e) = session.select_peer(peer.clone()).await {
                    writeln!(out, "! {e}")?;
                }
            }
            None => writeln!(out, "! {}", CliError::NoSuchPeer(index + 1))?,
        },
        Ok(Action::Help) => writeln!(out, "{HELP}")?,
        Err(e) => writeln!(out, "! {e}")?,
    }
    Ok(false)
}

fn print_event<W: Write>(
    out: &mut W,
    view: &mut ChatView,
    event: &SessionEvent,
    json: bool,
) -> Result<()> {
    let lines = view.apply(event);
    if json {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    } else {
        for line in lines {
            writeln!(out, "{line}")?;
        }
    }
    out.flush()?;
    Ok(())
}

// ============================================================================
// Peer Listing
// ============================================================================

/// Prints paired peers and whatever discovery reports within `window`.
///
/// Returns the number of distinct peers printed.
pub async fn list_peers<W: Write>(radio: &dyn Radio, window: Duration, out: &mut W) -> Result<usize> {
    let mut registry = DeviceRegistry::new();
    for peer in radio
        .paired_peers()
        .await
        .context("failed to read paired peers")?
    {
        registry.add(peer);
    }

    let (sink, mut queue) = mpsc::unbounded_channel();
    radio
        .start_discovery(sink)
        .await
        .context("failed to start discovery")?;

    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            next = queue.recv() => match next {
                Some(peer) => {
                    registry.add(peer);
                }
                None => break,
            },
        }
    }

    if let Err(e) = radio.cancel_discovery().await {
        warn!(error = %e, "Failed to cancel discovery");
    }

    if registry.is_empty() {
        writeln!(out, "no peers found")?;
    }
    for (i, peer) in registry.snapshot().iter().enumerate() {
        writeln!(out, "[{}] {}", i + 1, peer)?;
    }
    Ok(registry.len())
}
