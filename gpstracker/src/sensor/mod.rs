//! GPS receiver seam.
//!
//! A [`GpsReceiver`] is the hardware (or a stand-in for it). The state
//! machine subscribes and unsubscribes it; while subscribed the receiver
//! reports through a [`SensorSink`], which only enqueues onto the dispatcher.
//! Receiver callbacks never touch tracking state directly.
//!
//! Receivers shipped with the crate:
//!
//! - [`ManualReceiver`] forwards whatever the host application pushes
//! - [`SimulatedReceiver`] synthesises acquisition, fixes and dropouts
//! - [`ScriptedReceiver`] replays a JSON-lines event script

mod manual;
mod scripted;
mod simulated;

pub use manual::ManualReceiver;
pub use scripted::{ScriptEntry, ScriptError, ScriptedReceiver, SensorScript};
pub use simulated::{SimulatedReceiver, SimulationConfig, MIN_SIMULATION_TICK};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::dispatcher::{DispatchError, DispatchMessage, DispatcherHandle};
use crate::tracking::{LocationSample, SatelliteCounts, SatelliteInfo};

/// Errors reported by a receiver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The receiver could not be reached or refused the request.
    #[error("GPS receiver unavailable: {0}")]
    Unavailable(String),

    /// The process is not allowed to use the receiver.
    #[error("Permission to use the GPS receiver was denied")]
    PermissionDenied,
}

/// An event reported by the receiver.
///
/// Serialized with named tags, e.g. `{"satellites":{"in_view":6,"in_fix":3}}`
/// or `"provider_disabled"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorEvent {
    /// Satellite status report.
    Satellites(SatelliteCounts),
    /// Position fix.
    Location(LocationSample),
    /// The user switched the provider on.
    ProviderEnabled,
    /// The user switched the provider off.
    ProviderDisabled,
    /// Raw NMEA output.
    Nmea { timestamp_ms: i64, sentence: String },
    /// The receiver failed to deliver a report.
    Fault { reason: String },
}

impl SensorEvent {
    /// Whether this is measurement output that only arrives while
    /// subscribed, as opposed to a provider switch or a fault.
    pub fn is_report(&self) -> bool {
        matches!(
            self,
            SensorEvent::Satellites(_) | SensorEvent::Location(_) | SensorEvent::Nmea { .. }
        )
    }
}

/// The hardware side of the tracker.
///
/// All calls are fire-and-forget registrations and must not block.
pub trait GpsReceiver: Send + Sync {
    /// Start delivering events to `sink` until [`remove_updates`] is called.
    ///
    /// [`remove_updates`]: GpsReceiver::remove_updates
    fn request_updates(&self, sink: SensorSink) -> Result<(), SensorError>;

    /// Stop delivering events.
    fn remove_updates(&self) -> Result<(), SensorError>;

    /// Whether the provider is currently switched on.
    fn is_provider_enabled(&self) -> Result<bool, SensorError>;
}

/// Receiver-facing entry point into the dispatcher queue.
///
/// Every method enqueues one message and returns immediately. An error means
/// the service has stopped and the receiver should stop reporting.
#[derive(Debug, Clone)]
pub struct SensorSink {
    dispatcher: DispatcherHandle,
}

impl SensorSink {
    pub(crate) fn new(dispatcher: DispatcherHandle) -> Self {
        Self { dispatcher }
    }

    /// Report a satellite status with per-satellite detail.
    pub fn satellites(&self, satellites: &[SatelliteInfo]) -> Result<(), DispatchError> {
        for (index, satellite) in satellites.iter().enumerate() {
            trace!(
                index,
                prn = satellite.prn,
                snr = satellite.snr,
                used_in_fix = satellite.used_in_fix,
                "Satellite"
            );
        }
        self.satellite_counts(SatelliteCounts::from_satellites(satellites))
    }

    /// Report satellite counts.
    pub fn satellite_counts(&self, counts: SatelliteCounts) -> Result<(), DispatchError> {
        self.send(SensorEvent::Satellites(counts))
    }

    /// Report a position fix.
    pub fn location(&self, sample: LocationSample) -> Result<(), DispatchError> {
        self.send(SensorEvent::Location(sample))
    }

    pub fn provider_enabled(&self) -> Result<(), DispatchError> {
        self.send(SensorEvent::ProviderEnabled)
    }

    pub fn provider_disabled(&self) -> Result<(), DispatchError> {
        self.send(SensorEvent::ProviderDisabled)
    }

    /// Forward a raw NMEA sentence for logging.
    pub fn nmea(&self, timestamp_ms: i64, sentence: impl Into<String>) -> Result<(), DispatchError> {
        self.send(SensorEvent::Nmea {
            timestamp_ms,
            sentence: sentence.into(),
        })
    }

    /// Report a receiver failure. Logged only.
    pub fn fault(&self, reason: impl Into<String>) -> Result<(), DispatchError> {
        self.send(SensorEvent::Fault {
            reason: reason.into(),
        })
    }

    /// Enqueue any sensor event.
    pub fn send(&self, event: SensorEvent) -> Result<(), DispatchError> {
        self.dispatcher.send(DispatchMessage::Sensor(event))
    }

    /// Whether the service has stopped accepting events.
    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }
}
