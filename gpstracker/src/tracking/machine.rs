//! The tracking state machine.
//!
//! Owns the live [`StatusRecord`] and the four tracking timers. It is driven
//! exclusively by the dispatcher task through [`TrackingStateMachine::handle`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::location::{LocationSample, SatelliteCounts};
use super::status::{LoggingState, ProviderState, StatusRecord};
use super::timers::{TimerKind, TrackerTimers};
use crate::broadcast::StatusBroadcaster;
use crate::config::TrackingConfig;
use crate::dispatcher::{Command, DispatchMessage, DispatcherHandle};
use crate::sensor::{GpsReceiver, SensorError, SensorEvent, SensorSink};
use crate::timer::{TimerExpiry, TimerScheduler};

/// Whether the dispatcher should keep running after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Debounced lock tracking over a [`GpsReceiver`].
///
/// # Timers
///
/// | Timer | Armed when | On expiry |
/// |---|---|---|
/// | first-fix | logging starts | warning only |
/// | lock-lost | fix drops to zero while locked | report `NoLock` |
/// | improve-accuracy | accurate location while locked | sensor off, arm poll |
/// | poll | improve-accuracy expires | sensor back on |
///
/// While logging is stopped every timer is idle and the sensor is released.
pub struct TrackingStateMachine {
    config: TrackingConfig,
    status: StatusRecord,
    receiver: Arc<dyn GpsReceiver>,
    sink: SensorSink,
    sensor_active: bool,
    first_report: bool,
    timers: TrackerTimers,
    broadcaster: StatusBroadcaster,
}

impl TrackingStateMachine {
    pub(crate) fn new(
        config: TrackingConfig,
        receiver: Arc<dyn GpsReceiver>,
        dispatcher: DispatcherHandle,
        scheduler: TimerScheduler,
        broadcaster: StatusBroadcaster,
    ) -> Self {
        Self {
            config,
            status: StatusRecord::default(),
            receiver,
            sink: dispatcher.sensor_sink(),
            sensor_active: false,
            first_report: true,
            timers: TrackerTimers::new(scheduler, dispatcher),
            broadcaster,
        }
    }

    /// Current status.
    pub fn status(&self) -> StatusRecord {
        self.status
    }

    /// Whether the receiver is currently subscribed.
    pub fn is_sensor_active(&self) -> bool {
        self.sensor_active
    }

    #[cfg(test)]
    pub(crate) fn timers(&self) -> &TrackerTimers {
        &self.timers
    }

    /// Apply one dispatcher message.
    pub fn handle(&mut self, message: DispatchMessage) -> Flow {
        match message {
            DispatchMessage::Command(command) => return self.on_command(command),
            DispatchMessage::Sensor(event) => self.on_sensor_event(event),
            DispatchMessage::TimerExpired { timer, expiry } => self.on_timer_expired(timer, expiry),
        }
        Flow::Continue
    }

    /// Stop sequence for teardown without a `StopService` message.
    pub(crate) fn shutdown(&mut self) {
        self.stop_logging();
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn on_command(&mut self, command: Command) -> Flow {
        debug!(command = %command, "Handling command");
        match command {
            Command::StartLogging => self.start_logging(),
            Command::StopLogging => self.stop_logging(),
            Command::StopService => {
                self.stop_logging();
                info!("Stop service processed, dispatcher exiting");
                return Flow::Exit;
            }
            Command::TurnOnSensor => self.turn_on_sensor(),
            Command::RequestStatus => self.publish(),
        }
        Flow::Continue
    }

    fn start_logging(&mut self) {
        if self.status.logging_state == LoggingState::Logging {
            debug!("Already logging, start ignored");
            return;
        }

        if let Err(e) = self.subscribe() {
            error!(error = %e, "Failed to subscribe to GPS receiver, logging not started");
            self.publish();
            return;
        }

        self.status.logging_state = LoggingState::Logging;
        if let Some(timeout) = self.config.first_fix_timeout {
            self.timers.arm(TimerKind::FirstFix, timeout);
        }
        info!(status = %self.status, "Logging started");
        self.publish();
    }

    fn stop_logging(&mut self) {
        self.unsubscribe();
        self.timers.cancel_all();
        debug_assert!(self.timers.all_idle());
        self.status.logging_state = LoggingState::Stopped;
        info!(status = %self.status, "Logging stopped");
        self.publish();
    }

    fn turn_on_sensor(&mut self) {
        if self.status.logging_state != LoggingState::Logging {
            debug!("Not logging, sensor stays off");
            return;
        }
        if self.sensor_active {
            debug!("Sensor already on");
            return;
        }

        let previous = self.status.provider_state;
        if let Err(e) = self.subscribe() {
            warn!(
                error = %e,
                retry_ms = self.config.locked_poll_time.as_millis() as u64,
                "Failed to turn the sensor back on, retrying after the poll interval"
            );
            self.timers.arm(TimerKind::Poll, self.config.locked_poll_time);
            return;
        }
        if self.status.provider_state != previous {
            self.publish();
        }
    }

    // =========================================================================
    // Sensor events
    // =========================================================================

    fn on_sensor_event(&mut self, event: SensorEvent) {
        if self.status.logging_state != LoggingState::Logging {
            debug!(event = ?event, "Sensor event while not logging, ignored");
            return;
        }

        if !self.sensor_active && event.is_report() {
            debug!(event = ?event, "Report queued before the sensor went off, ignored");
            return;
        }

        match event {
            SensorEvent::Satellites(counts) => self.on_satellites(counts),
            SensorEvent::Location(sample) => self.on_location(sample),
            SensorEvent::ProviderEnabled => self.on_provider_enabled(),
            SensorEvent::ProviderDisabled => self.on_provider_disabled(),
            SensorEvent::Nmea {
                timestamp_ms,
                sentence,
            } => {
                let flattened = sentence.replace(['\r', '\n'], " ");
                debug!(timestamp_ms, sentence = %flattened.trim_end(), "NMEA");
            }
            SensorEvent::Fault { reason } => {
                warn!(reason = %reason, status = %self.status, "GPS receiver fault, keeping last status");
            }
        }
    }

    fn on_satellites(&mut self, counts: SatelliteCounts) {
        let previous = self.status.provider_state;
        let counts_changed = counts.in_view != self.status.satellites_in_view
            || counts.in_fix != self.status.satellites_in_fix;
        self.status.satellites_in_view = counts.in_view;
        self.status.satellites_in_fix = counts.in_fix;

        if counts.has_fix() {
            self.timers.cancel(TimerKind::LockLost);
            self.timers.cancel(TimerKind::FirstFix);
            self.status.provider_state = ProviderState::Locked;
        } else {
            self.timers.cancel(TimerKind::ImproveAccuracy);
            if previous == ProviderState::Locked {
                if !self.timers.is_armed(TimerKind::LockLost) {
                    debug!(
                        filter_ms = self.config.lock_lost_filter_time.as_millis() as u64,
                        "Fix lost, holding lock for the filter window"
                    );
                    self.timers
                        .arm(TimerKind::LockLost, self.config.lock_lost_filter_time);
                }
            } else {
                self.status.provider_state = ProviderState::NoLock;
            }
        }

        if self.status.provider_state != previous {
            info!(from = %previous, to = %self.status.provider_state, "Provider state changed");
            self.publish();
        } else if counts_changed && self.config.publish_satellite_changes {
            self.publish();
        }
    }

    fn on_location(&mut self, sample: LocationSample) {
        debug!(location = %sample, "Location");

        if self.status.provider_state == ProviderState::Locked
            && !self.timers.is_armed(TimerKind::LockLost)
            && sample.accuracy_m <= self.config.required_accuracy_m
            && !self.timers.is_armed(TimerKind::ImproveAccuracy)
        {
            debug!(
                accuracy_m = sample.accuracy_m,
                extra_ms = self.config.extra_time_after_lock.as_millis() as u64,
                "Accurate fix, sampling a little longer before power save"
            );
            self.timers
                .arm(TimerKind::ImproveAccuracy, self.config.extra_time_after_lock);
        }

        self.broadcaster.publish_location(sample);
    }

    fn on_provider_disabled(&mut self) {
        if self.status.provider_state == ProviderState::Disabled && !self.first_report {
            return;
        }
        self.first_report = false;
        self.timers.cancel(TimerKind::LockLost);
        self.timers.cancel(TimerKind::ImproveAccuracy);
        self.status.provider_state = ProviderState::Disabled;
        info!("GPS provider disabled");
        self.publish();
    }

    fn on_provider_enabled(&mut self) {
        if self.status.provider_state != ProviderState::Disabled {
            return;
        }
        self.first_report = false;
        self.status.provider_state = ProviderState::NoLock;
        info!("GPS provider enabled");
        self.publish();
    }

    // =========================================================================
    // Timer expiries
    // =========================================================================

    fn on_timer_expired(&mut self, kind: TimerKind, expiry: TimerExpiry) {
        if !self.timers.is_current(kind, expiry) {
            debug!(
                timer = kind.name(),
                generation = expiry.generation,
                "Stale timer expiry dropped"
            );
            return;
        }
        if self.status.logging_state != LoggingState::Logging {
            debug!(timer = kind.name(), "Timer expiry while not logging, ignored");
            return;
        }

        match kind {
            TimerKind::LockLost => {
                if self.status.provider_state == ProviderState::Locked {
                    self.status.provider_state = ProviderState::NoLock;
                    info!("Lock lost");
                    self.publish();
                }
            }
            TimerKind::ImproveAccuracy => {
                info!(
                    poll_ms = self.config.locked_poll_time.as_millis() as u64,
                    "Fix refined, turning the sensor off until the next poll"
                );
                self.unsubscribe();
                self.timers
                    .arm(TimerKind::Poll, self.config.locked_poll_time);
            }
            TimerKind::Poll => {
                debug!("Poll interval elapsed, turning the sensor on");
                self.turn_on_sensor();
            }
            TimerKind::FirstFix => {
                warn!(
                    timeout_ms = self
                        .config
                        .first_fix_timeout
                        .map(|t| t.as_millis() as u64)
                        .unwrap_or_default(),
                    status = %self.status,
                    "No GPS fix since logging started"
                );
            }
        }
    }

    // =========================================================================
    // Receiver subscription
    // =========================================================================

    fn subscribe(&mut self) -> Result<(), SensorError> {
        if self.sensor_active {
            return Ok(());
        }
        self.receiver.request_updates(self.sink.clone())?;
        self.sensor_active = true;
        debug!("GPS receiver subscribed");
        self.refresh_provider_state();
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if !self.sensor_active {
            return;
        }
        self.sensor_active = false;
        match self.receiver.remove_updates() {
            Ok(()) => debug!("GPS receiver unsubscribed"),
            Err(e) => warn!(error = %e, "Failed to unsubscribe from GPS receiver"),
        }
    }

    /// Catch up with provider changes missed while unsubscribed.
    fn refresh_provider_state(&mut self) {
        match self.receiver.is_provider_enabled() {
            Ok(true) => {
                if self.status.provider_state == ProviderState::Locked {
                    // The lock is stale until a fresh fix confirms it.
                    if !self.timers.is_armed(TimerKind::LockLost) {
                        self.timers
                            .arm(TimerKind::LockLost, self.config.lock_lost_filter_time);
                    }
                } else {
                    self.status.provider_state = ProviderState::NoLock;
                }
            }
            Ok(false) => {
                self.status.provider_state = ProviderState::Disabled;
            }
            Err(e) => {
                warn!(error = %e, "Could not query GPS provider state, keeping last state");
            }
        }
    }

    fn publish(&self) {
        self.broadcaster.publish_status(self.status);
    }
}
