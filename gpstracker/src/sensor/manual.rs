//! Receiver driven by the host application.

use parking_lot::Mutex;
use tracing::debug;

use super::{GpsReceiver, SensorError, SensorSink};

#[derive(Debug)]
struct ManualState {
    sink: Option<SensorSink>,
    provider_enabled: bool,
    fail_next_request: Option<SensorError>,
    subscribe_count: usize,
    unsubscribe_count: usize,
}

/// A receiver whose events are pushed by the caller.
///
/// Useful when positions come from an existing source (a serial NMEA
/// reader, another service) rather than a device the tracker owns, and for
/// tests: it records every subscribe and unsubscribe.
#[derive(Debug)]
pub struct ManualReceiver {
    state: Mutex<ManualState>,
}

impl Default for ManualReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualReceiver {
    /// Create a receiver with the provider switched on.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                sink: None,
                provider_enabled: true,
                fail_next_request: None,
                subscribe_count: 0,
                unsubscribe_count: 0,
            }),
        }
    }

    /// The sink of the current subscription, if subscribed.
    pub fn sink(&self) -> Option<SensorSink> {
        self.state.lock().sink.clone()
    }

    /// Whether the tracker is currently subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Switch the provider on or off.
    ///
    /// Only changes what [`GpsReceiver::is_provider_enabled`] reports; push
    /// `provider_enabled` / `provider_disabled` through the sink to notify a
    /// subscribed tracker.
    pub fn set_provider_enabled(&self, enabled: bool) {
        self.state.lock().provider_enabled = enabled;
    }

    /// Make the next `request_updates` fail with `error`.
    pub fn fail_next_request(&self, error: SensorError) {
        self.state.lock().fail_next_request = Some(error);
    }

    /// Number of successful `request_updates` calls.
    pub fn subscribe_count(&self) -> usize {
        self.state.lock().subscribe_count
    }

    /// Number of `remove_updates` calls.
    pub fn unsubscribe_count(&self) -> usize {
        self.state.lock().unsubscribe_count
    }
}

impl GpsReceiver for ManualReceiver {
    fn request_updates(&self, sink: SensorSink) -> Result<(), SensorError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_request.take() {
            return Err(error);
        }
        state.sink = Some(sink);
        state.subscribe_count += 1;
        debug!(count = state.subscribe_count, "Manual receiver subscribed");
        Ok(())
    }

    fn remove_updates(&self) -> Result<(), SensorError> {
        let mut state = self.state.lock();
        state.sink = None;
        state.unsubscribe_count += 1;
        debug!(count = state.unsubscribe_count, "Manual receiver unsubscribed");
        Ok(())
    }

    fn is_provider_enabled(&self) -> Result<bool, SensorError> {
        Ok(self.state.lock().provider_enabled)
    }
}
