//! Tracker service lifecycle.
//!
//! [`TrackerService`] owns one instance of everything: the timer scheduler,
//! the dispatcher task (which owns the state machine) and the broadcast
//! channel. Clients talk to it through cloneable [`ServiceHandle`]s.
//!
//! # Example
//!
//! ```ignore
//! use gpstracker::config::ServiceConfig;
//! use gpstracker::sensor::SimulatedReceiver;
//! use gpstracker::service::TrackerService;
//!
//! let receiver = Arc::new(SimulatedReceiver::default());
//! let mut service = TrackerService::start(ServiceConfig::default(), receiver)?;
//!
//! let handle = service.handle();
//! let mut events = handle.subscribe();
//! handle.start_logging()?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//!
//! service.shutdown().await?;
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{StatusBroadcaster, TrackerEvent};
use crate::config::ServiceConfig;
use crate::dispatcher::{Command, CommandDispatcher, DispatchError, DispatcherHandle};
use crate::sensor::{GpsReceiver, SensorSink};
use crate::timer::TimerScheduler;
use crate::tracking::{LoggingState, StatusRecord, TrackingStateMachine};

/// Errors starting or stopping the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// `start` was called outside a tokio runtime.
    #[error("Tracker service must be started inside a tokio runtime")]
    NoRuntime,

    /// The configuration cannot be used.
    #[error("Invalid service configuration: {0}")]
    InvalidConfig(String),

    /// The dispatcher task panicked or was aborted.
    #[error("Dispatcher task failed: {0}")]
    DispatcherFailed(String),
}

/// Client-side access to a running service.
///
/// Every method either enqueues a command or reads a cached value; none waits
/// for the state to settle.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    dispatcher: DispatcherHandle,
    broadcaster: StatusBroadcaster,
}

impl ServiceHandle {
    /// Enqueue a command.
    pub fn send(&self, command: Command) -> Result<(), DispatchError> {
        self.dispatcher.send_command(command)
    }

    pub fn start_logging(&self) -> Result<(), DispatchError> {
        self.send(Command::StartLogging)
    }

    pub fn stop_logging(&self) -> Result<(), DispatchError> {
        self.send(Command::StopLogging)
    }

    /// Ask for a `STATUS` publish of the current state.
    pub fn request_status(&self) -> Result<(), DispatchError> {
        self.send(Command::RequestStatus)
    }

    /// Logging state of the last published status.
    pub fn logging_state(&self) -> LoggingState {
        self.broadcaster.latest().logging_state
    }

    /// The last published status.
    pub fn tracking_status(&self) -> StatusRecord {
        self.broadcaster.latest()
    }

    /// Subscribe to `STATUS` and `LOCATION` publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.broadcaster.subscribe()
    }

    /// Whether the dispatcher still accepts commands.
    pub fn is_running(&self) -> bool {
        !self.dispatcher.is_closed()
    }

    /// Resolves once the service has stopped. Every status it published
    /// before stopping is already in the broadcast channel by then.
    pub async fn stopped(&self) {
        self.dispatcher.closed().await
    }

    /// A sink for feeding receiver events directly into this service.
    pub fn sensor_sink(&self) -> SensorSink {
        self.dispatcher.sensor_sink()
    }
}

/// A running tracker service.
///
/// Dropping the service without calling [`shutdown`](Self::shutdown)
/// cancels the dispatcher, which still runs the stop sequence, and tears
/// down the timer scheduler.
#[derive(Debug)]
pub struct TrackerService {
    handle: ServiceHandle,
    scheduler: TimerScheduler,
    shutdown: CancellationToken,
    task: Option<JoinHandle<StatusRecord>>,
}

impl TrackerService {
    /// Start the service on the current tokio runtime.
    ///
    /// Logging is not started; send `StartLogging` through a handle.
    pub fn start(
        config: ServiceConfig,
        receiver: Arc<dyn GpsReceiver>,
    ) -> Result<Self, ServiceError> {
        let runtime = Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;
        if config.broadcast_capacity == 0 {
            return Err(ServiceError::InvalidConfig(
                "broadcast capacity must be at least 1".to_string(),
            ));
        }

        let scheduler = TimerScheduler::new(runtime.clone());
        let (dispatcher, rx) = DispatcherHandle::channel();
        let broadcaster = StatusBroadcaster::new(config.broadcast_capacity);

        let machine = TrackingStateMachine::new(
            config.tracking.clone(),
            receiver,
            dispatcher.clone(),
            scheduler.clone(),
            broadcaster.clone(),
        );

        let shutdown = CancellationToken::new();
        let task = runtime.spawn(CommandDispatcher::new(machine, rx).run(shutdown.clone()));

        info!(
            required_accuracy_m = config.tracking.required_accuracy_m,
            lock_lost_filter_ms = config.tracking.lock_lost_filter_time.as_millis() as u64,
            locked_poll_ms = config.tracking.locked_poll_time.as_millis() as u64,
            "Tracker service started"
        );

        Ok(Self {
            handle: ServiceHandle {
                dispatcher,
                broadcaster,
            },
            scheduler,
            shutdown,
            task: Some(task),
        })
    }

    /// A handle for clients.
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Whether the dispatcher is still running.
    pub fn is_running(&self) -> bool {
        self.task.is_some() && self.handle.is_running()
    }

    /// Send `StopService`, wait for the dispatcher to exit and tear down the
    /// timer scheduler. Returns the final status.
    ///
    /// Safe to call more than once, and after a client already sent
    /// `StopService`.
    pub async fn shutdown(&mut self) -> Result<StatusRecord, ServiceError> {
        let Some(task) = self.task.take() else {
            debug!("Tracker service already shut down");
            return Ok(self.handle.tracking_status());
        };

        if self.handle.send(Command::StopService).is_err() {
            debug!("Dispatcher already closed");
        }

        let result = task.await;
        self.scheduler.stop_all();

        match result {
            Ok(status) => {
                info!(status = %status, "Tracker service shut down");
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, "Dispatcher task did not finish cleanly");
                Err(ServiceError::DispatcherFailed(e.to_string()))
            }
        }
    }
}

impl Drop for TrackerService {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!("Tracker service dropped while running, cancelling dispatcher");
            self.shutdown.cancel();
        }
        self.scheduler.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ManualReceiver;

    #[test]
    fn test_start_outside_runtime_fails() {
        let result = TrackerService::start(
            ServiceConfig::default(),
            Arc::new(ManualReceiver::new()),
        );
        assert!(matches!(result, Err(ServiceError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let result = TrackerService::start(
            ServiceConfig::default().with_broadcast_capacity(0),
            Arc::new(ManualReceiver::new()),
        );
        assert!(matches!(result, Err(ServiceError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let receiver = Arc::new(ManualReceiver::new());
        let mut service = TrackerService::start(ServiceConfig::default(), receiver).unwrap();
        let handle = service.handle();
        assert!(service.is_running());

        let status = service.shutdown().await.unwrap();
        assert_eq!(status.logging_state, LoggingState::Stopped);
        assert!(!service.is_running());
        assert!(!handle.is_running());
        assert_eq!(handle.start_logging(), Err(DispatchError::Closed));

        let again = service.shutdown().await.unwrap();
        assert_eq!(again, status);
    }

    #[tokio::test]
    async fn test_drop_releases_receiver() {
        let receiver = Arc::new(ManualReceiver::new());
        let service =
            TrackerService::start(ServiceConfig::default(), receiver.clone()).unwrap();
        let handle = service.handle();
        let mut events = handle.subscribe();

        handle.start_logging().unwrap();
        events.recv().await.unwrap();
        assert!(receiver.is_subscribed());

        drop(service);

        // The cancelled dispatcher still runs the stop sequence.
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            TrackerEvent::Status(handle.tracking_status())
        );
        assert_eq!(handle.logging_state(), LoggingState::Stopped);
        assert!(!receiver.is_subscribed());
    }
}
