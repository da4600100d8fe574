//! The single task that drives the state machine.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::command::DispatchMessage;
use crate::tracking::{Flow, StatusRecord, TrackingStateMachine};

/// Consumes the dispatcher queue and applies each message to the state
/// machine, one at a time.
///
/// The machine is moved into the task, so no other context can reach it.
pub struct CommandDispatcher {
    machine: TrackingStateMachine,
    rx: mpsc::UnboundedReceiver<DispatchMessage>,
}

impl CommandDispatcher {
    pub(crate) fn new(
        machine: TrackingStateMachine,
        rx: mpsc::UnboundedReceiver<DispatchMessage>,
    ) -> Self {
        Self { machine, rx }
    }

    /// Run until `StopService` is processed or `shutdown` is cancelled.
    ///
    /// Cancellation runs the same stop sequence as `StopService`. Either way
    /// the queue is closed on exit, so later sends fail with
    /// [`DispatchError::Closed`](super::DispatchError::Closed). Returns the
    /// final status.
    pub async fn run(mut self, shutdown: CancellationToken) -> StatusRecord {
        info!("Command dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Command dispatcher cancelled, stopping");
                    self.machine.shutdown();
                    break;
                }

                message = self.rx.recv() => {
                    let Some(message) = message else {
                        // Every producer dropped its handle.
                        self.machine.shutdown();
                        break;
                    };
                    if self.machine.handle(message) == Flow::Exit {
                        break;
                    }
                }
            }
        }

        self.rx.close();
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "Discarded messages queued behind shutdown");
        }

        let status = self.machine.status();
        info!(status = %status, "Command dispatcher stopped");
        status
    }
}
