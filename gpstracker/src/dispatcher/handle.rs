//! Producer side of the dispatcher queue.

use thiserror::Error;
use tokio::sync::mpsc;

use super::command::{Command, DispatchMessage};
use crate::sensor::SensorSink;
use crate::timer::TimerExpiry;
use crate::tracking::TimerKind;

/// Errors enqueuing onto the dispatcher.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher has processed `StopService` (or was torn down) and
    /// accepts no further messages.
    #[error("Dispatcher is closed")]
    Closed,
}

/// Cloneable handle for enqueuing messages.
///
/// Enqueuing never blocks. Messages are consumed in send order by the single
/// dispatcher task.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<DispatchMessage>,
}

impl DispatcherHandle {
    /// Create a handle and the receiving end for a [`CommandDispatcher`].
    ///
    /// [`CommandDispatcher`]: super::CommandDispatcher
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<DispatchMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a message.
    pub fn send(&self, message: impl Into<DispatchMessage>) -> Result<(), DispatchError> {
        self.tx
            .send(message.into())
            .map_err(|_| DispatchError::Closed)
    }

    /// Enqueue a command.
    pub fn send_command(&self, command: Command) -> Result<(), DispatchError> {
        self.send(DispatchMessage::Command(command))
    }

    pub(crate) fn timer_expired(
        &self,
        timer: TimerKind,
        expiry: TimerExpiry,
    ) -> Result<(), DispatchError> {
        self.send(DispatchMessage::TimerExpired { timer, expiry })
    }

    /// A sink for receiver callbacks that feeds this queue.
    pub fn sensor_sink(&self) -> SensorSink {
        SensorSink::new(self.clone())
    }

    /// Whether the dispatcher has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the dispatcher stops accepting messages.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (handle, mut rx) = DispatcherHandle::channel();
        handle.send_command(Command::StartLogging).unwrap();
        handle.send_command(Command::RequestStatus).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(DispatchMessage::Command(Command::StartLogging))
        );
        assert_eq!(
            rx.recv().await,
            Some(DispatchMessage::Command(Command::RequestStatus))
        );
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (handle, mut rx) = DispatcherHandle::channel();
        assert!(!handle.is_closed());

        rx.close();

        assert!(handle.is_closed());
        assert_eq!(
            handle.send_command(Command::StartLogging),
            Err(DispatchError::Closed)
        );
    }
}
