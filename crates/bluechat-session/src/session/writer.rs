//! Ordered writer for outbound payloads.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::TransportEndpoint;

use super::commands::{report, SessionCommand};

/// Spawns the writer task.
///
/// Payloads are written in the order they were queued. The first failure is
/// reported to the actor and the task stops; later payloads are dropped.
pub(crate) fn spawn_writer(
    endpoint: Arc<TransportEndpoint>,
    attempt: u64,
    commands: mpsc::WeakSender<SessionCommand>,
    cancel: CancellationToken,
) -> (mpsc::UnboundedSender<Vec<u8>>, JoinHandle<()>) {
    let (outbound, mut queue) = mpsc::unbounded_channel::<Vec<u8>>();

    let task = tokio::spawn(async move {
        loop {
            let payload = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = queue.recv() => match next {
                    Some(payload) => payload,
                    None => break,
                },
            };

            let written = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                written = endpoint.write(&payload) => written,
            };

            match written {
                Ok(()) => debug!(attempt, bytes = payload.len(), "Payload written"),
                Err(e) => {
                    warn!(attempt, error = %e, "Write failed");
                    let failure = SessionCommand::WriteFailed {
                        attempt,
                        error: e.to_string(),
                    };
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = report(&commands, failure) => {}
                    }
                    break;
                }
            }
        }
        debug!(attempt, "Writer stopped");
    });

    (outbound, task)
}
