//! Read loop - turns each successful read into one inbound message.
//!
//! There is no framing: a chunk is a message. The loop stops on
//! end-of-stream, on a read error, or when its token is cancelled, and it
//! reports the first two back to the session actor.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use bluechat_core::ChatMessage;

use crate::endpoint::TransportEndpoint;
use crate::session::commands::{report, ReadEnd, SessionCommand};

/// Spawns the read loop for one endpoint.
///
/// # Arguments
///
/// * `endpoint` - The connected endpoint
/// * `chunk_size` - Maximum bytes per read
/// * `attempt` - Generation the completions are tagged with
/// * `commands` - The session actor's queue
/// * `cancel` - Stops the loop without reporting
pub(crate) fn spawn_read_loop(
    endpoint: Arc<TransportEndpoint>,
    chunk_size: usize,
    attempt: u64,
    commands: mpsc::WeakSender<SessionCommand>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; chunk_size.max(1)];

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempt, "Read loop cancelled");
                    return;
                }
                read = endpoint.read(&mut buf) => read,
            };

            let command = match read {
                Ok(0) => {
                    debug!(attempt, "Read loop reached end of stream");
                    SessionCommand::ReadLoopEnded {
                        attempt,
                        end: ReadEnd::Eof,
                    }
                }
                Ok(n) => {
                    debug!(attempt, bytes = n, "Chunk received");
                    SessionCommand::Inbound {
                        attempt,
                        message: ChatMessage::received(&buf[..n]),
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Read failed");
                    SessionCommand::ReadLoopEnded {
                        attempt,
                        end: ReadEnd::Error(e.to_string()),
                    }
                }
            };

            let finished = matches!(command, SessionCommand::ReadLoopEnded { .. });
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = report(&commands, command) => {}
            }
            if finished || commands.upgrade().is_none() {
                return;
            }
        }
    })
}
