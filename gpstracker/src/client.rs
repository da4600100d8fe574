//! Client manager: the consuming side of the service.
//!
//! A [`TrackerClient`] attaches to a running service, forwards every
//! `STATUS` and `LOCATION` publish to its callbacks, and caches the last
//! status so UI code can read it synchronously.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::TrackerEvent;
use crate::dispatcher::Command;
use crate::service::ServiceHandle;
use crate::tracking::{LocationSample, LoggingState, StatusRecord};

type StatusCallback = Box<dyn Fn(StatusRecord) + Send + Sync>;
type LocationCallback = Box<dyn Fn(LocationSample) + Send + Sync>;

#[derive(Debug, Default)]
struct ClientCache {
    last_status: Option<StatusRecord>,
}

struct Connection {
    service: ServiceHandle,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
}

/// Subscription lifecycle and command submission for one consumer.
#[derive(Default)]
pub struct TrackerClient {
    connection: Option<Connection>,
    cache: Arc<Mutex<ClientCache>>,
}

impl std::fmt::Debug for TrackerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerClient")
            .field("attached", &self.connection.is_some())
            .field("last_status", &self.cache.lock().last_status)
            .finish()
    }
}

impl TrackerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to `service` and start forwarding publishes.
    ///
    /// Sends `RequestStatus` once attached so the cache fills without
    /// waiting for the next change. Attaching while attached is a no-op.
    /// Must be called inside a tokio runtime; otherwise the error is logged
    /// and the client stays detached. Forwarding ends on `detach` or once
    /// the service stops; the client stays attached until `detach`.
    pub fn attach<S, L>(&mut self, service: &ServiceHandle, on_status: S, on_location: L)
    where
        S: Fn(StatusRecord) + Send + Sync + 'static,
        L: Fn(LocationSample) + Send + Sync + 'static,
    {
        if self.connection.is_some() {
            warn!("Client already attached, attach ignored");
            return;
        }
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Cannot attach client outside a tokio runtime");
                return;
            }
        };

        let events = service.subscribe();
        let cancel = CancellationToken::new();
        let listener = runtime.spawn(listen(
            events,
            service.clone(),
            cancel.clone(),
            Arc::clone(&self.cache),
            Box::new(on_status),
            Box::new(on_location),
        ));

        self.connection = Some(Connection {
            service: service.clone(),
            cancel,
            listener,
        });
        info!("Client attached");

        self.send_command(Command::RequestStatus);
    }

    /// Stop forwarding publishes. Detaching while detached is a no-op.
    ///
    /// The cached status is kept.
    pub fn detach(&mut self) {
        let Some(connection) = self.connection.take() else {
            warn!("Client not attached, detach ignored");
            return;
        };
        connection.cancel.cancel();
        drop(connection.listener);
        info!("Client detached");
    }

    /// Whether the client is attached (the service may have stopped since).
    pub fn is_attached(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the client is attached to a service that still accepts
    /// commands.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.service.is_running())
            .unwrap_or(false)
    }

    /// Whether publishes are still being forwarded. Turns false after
    /// `detach` or once the service has stopped and its last publishes were
    /// delivered.
    pub fn is_listening(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| !c.listener.is_finished())
            .unwrap_or(false)
    }

    /// The most recent status received, `None` before the first delivery.
    pub fn last_known_status(&self) -> Option<StatusRecord> {
        self.cache.lock().last_status
    }

    /// Logging state of the cached status, `Unknown` before the first
    /// delivery.
    pub fn logging_state(&self) -> LoggingState {
        self.last_known_status()
            .map(|status| status.logging_state)
            .unwrap_or(LoggingState::Unknown)
    }

    /// Send a command to the service. Logged and dropped when not connected.
    pub fn send_command(&self, command: Command) {
        let Some(connection) = self.connection.as_ref() else {
            warn!(command = %command, "Client not attached, command dropped");
            return;
        };
        if let Err(e) = connection.service.send(command) {
            warn!(command = %command, error = %e, "Service not running, command dropped");
        }
    }

    pub fn start_logging(&self) {
        self.send_command(Command::StartLogging);
    }

    pub fn stop_logging(&self) {
        self.send_command(Command::StopLogging);
    }
}

impl Drop for TrackerClient {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
        }
    }
}

async fn listen(
    mut events: broadcast::Receiver<TrackerEvent>,
    service: ServiceHandle,
    cancel: CancellationToken,
    cache: Arc<Mutex<ClientCache>>,
    on_status: StatusCallback,
    on_location: LocationCallback,
) {
    let deliver = |event: TrackerEvent| match event {
        TrackerEvent::Status(status) => {
            cache.lock().last_status = Some(status);
            on_status(status);
        }
        TrackerEvent::Location(sample) => on_location(sample),
    };

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Client listener stopped");
                break;
            }

            event = events.recv() => match event {
                Ok(event) => deliver(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Client fell behind, publishes dropped");
                }
                Err(RecvError::Closed) => {
                    info!("Service broadcast closed, client listener exiting");
                    break;
                }
            },

            _ = service.stopped() => {
                // The final stop status is already queued.
                loop {
                    match events.try_recv() {
                        Ok(event) => deliver(event),
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(skipped, "Client fell behind, publishes dropped");
                        }
                        Err(_) => break,
                    }
                }
                info!("Service stopped, client listener exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::sensor::ManualReceiver;
    use crate::service::TrackerService;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn start_service() -> (TrackerService, Arc<ManualReceiver>) {
        let receiver = Arc::new(ManualReceiver::new());
        let service = TrackerService::start(ServiceConfig::default(), receiver.clone()).unwrap();
        (service, receiver)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<StatusRecord>) -> StatusRecord {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_attach_requests_initial_status() {
        let (mut service, _) = start_service();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut client = TrackerClient::new();
        assert_eq!(client.last_known_status(), None);
        assert_eq!(client.logging_state(), LoggingState::Unknown);

        client.attach(&service.handle(), move |s| { let _ = tx.send(s); }, |_| {});

        let status = next(&mut rx).await;
        assert_eq!(status, StatusRecord::default());
        assert_eq!(client.last_known_status(), Some(status));
        assert_eq!(client.logging_state(), LoggingState::Stopped);

        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_attach_is_noop() {
        let (mut service, _) = start_service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel::<StatusRecord>();

        let mut client = TrackerClient::new();
        client.attach(&service.handle(), move |s| { let _ = tx.send(s); }, |_| {});
        client.attach(&service.handle(), move |s| { let _ = second_tx.send(s); }, |_| {});

        next(&mut rx).await;
        client.start_logging();
        assert!(next(&mut rx).await.is_logging());
        assert!(second_rx.try_recv().is_err());

        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_detach_twice_and_keep_cache() {
        let (mut service, _) = start_service();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut client = TrackerClient::new();
        client.attach(&service.handle(), move |s| { let _ = tx.send(s); }, |_| {});
        let status = next(&mut rx).await;

        client.detach();
        client.detach();
        assert!(!client.is_attached());
        assert_eq!(client.last_known_status(), Some(status));

        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_dropped_when_not_connected() {
        let (mut service, receiver) = start_service();
        let client = TrackerClient::new();
        client.start_logging();
        assert!(!client.is_connected());

        service.shutdown().await.unwrap();
        assert_eq!(receiver.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_listener_ends_with_service() {
        let (mut service, _) = start_service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = TrackerClient::new();
        client.attach(&service.handle(), move |s| { let _ = tx.send(s); }, |_| {});
        next(&mut rx).await;
        client.start_logging();
        assert!(next(&mut rx).await.is_logging());
        assert!(client.is_listening());

        service.shutdown().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while client.is_listening() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(client.is_attached());
        assert_eq!(
            client.logging_state(),
            LoggingState::Stopped,
            "stop status delivered before the listener exits"
        );
    }

    #[tokio::test]
    async fn test_commands_after_service_stop_are_dropped() {
        let (mut service, receiver) = start_service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = TrackerClient::new();
        client.attach(&service.handle(), move |s| { let _ = tx.send(s); }, |_| {});
        next(&mut rx).await;

        service.shutdown().await.unwrap();
        let cached = client.last_known_status();

        assert!(client.is_attached());
        assert!(!client.is_connected());
        client.start_logging();
        assert_eq!(receiver.subscribe_count(), 0);
        assert_eq!(client.logging_state(), LoggingState::Stopped);
        assert!(cached.is_some());
    }
}
