//! Runtime settings for the tracking service.

use std::time::Duration;

// ==================== Tracking Defaults ====================

/// Default accuracy a fix must reach before the sensor may be duty-cycled,
/// in metres.
pub const DEFAULT_REQUIRED_ACCURACY_M: f32 = 20.0;

/// Default time the sensor stays off between polls once locked.
pub const DEFAULT_LOCKED_POLL_TIME: Duration = Duration::from_secs(15);

/// Default debounce window before a lost lock is reported.
pub const DEFAULT_LOCK_LOST_FILTER_TIME: Duration = Duration::from_secs(10);

/// Default time the sensor stays on after an accurate fix to refine it.
pub const DEFAULT_EXTRA_TIME_AFTER_LOCK: Duration = Duration::from_secs(2);

/// Default bound on the wait for the first lock after logging starts.
pub const DEFAULT_FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(120);

/// Default capacity of the status broadcast channel.
///
/// Subscribers that fall further behind than this lose the oldest events.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Timing and threshold settings for the tracking state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Accuracy (metres) at or below which a fix counts as accurate.
    pub required_accuracy_m: f32,

    /// How long the sensor sleeps between polls once locked.
    pub locked_poll_time: Duration,

    /// Debounce window between losing the fix and reporting `NoLock`.
    pub lock_lost_filter_time: Duration,

    /// How long to keep sampling after the first accurate fix.
    pub extra_time_after_lock: Duration,

    /// Bound on the wait for the first lock. `None` disables the timer.
    pub first_fix_timeout: Option<Duration>,

    /// Publish a status whenever satellite counts change, not only when the
    /// provider state changes.
    pub publish_satellite_changes: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            required_accuracy_m: DEFAULT_REQUIRED_ACCURACY_M,
            locked_poll_time: DEFAULT_LOCKED_POLL_TIME,
            lock_lost_filter_time: DEFAULT_LOCK_LOST_FILTER_TIME,
            extra_time_after_lock: DEFAULT_EXTRA_TIME_AFTER_LOCK,
            first_fix_timeout: Some(DEFAULT_FIRST_FIX_TIMEOUT),
            publish_satellite_changes: false,
        }
    }
}

impl TrackingConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the required accuracy.
    pub fn with_required_accuracy(mut self, metres: f32) -> Self {
        self.required_accuracy_m = metres;
        self
    }

    /// Set the poll interval used once locked.
    pub fn with_locked_poll_time(mut self, duration: Duration) -> Self {
        self.locked_poll_time = duration;
        self
    }

    /// Set the lock-lost debounce window.
    pub fn with_lock_lost_filter_time(mut self, duration: Duration) -> Self {
        self.lock_lost_filter_time = duration;
        self
    }

    /// Set the accuracy refinement window.
    pub fn with_extra_time_after_lock(mut self, duration: Duration) -> Self {
        self.extra_time_after_lock = duration;
        self
    }

    /// Set (or disable) the first-fix timeout.
    pub fn with_first_fix_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.first_fix_timeout = timeout;
        self
    }

    /// Publish on satellite count changes too.
    pub fn with_publish_satellite_changes(mut self, enabled: bool) -> Self {
        self.publish_satellite_changes = enabled;
        self
    }
}

/// Configuration for a [`TrackerService`](crate::service::TrackerService).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// State machine settings.
    pub tracking: TrackingConfig,

    /// Broadcast channel capacity.
    pub broadcast_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Create a service config around the given tracking settings.
    pub fn new(tracking: TrackingConfig) -> Self {
        Self {
            tracking,
            ..Self::default()
        }
    }

    /// Set the broadcast channel capacity.
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_defaults() {
        let config = TrackingConfig::default();
        assert_eq!(config.required_accuracy_m, 20.0);
        assert_eq!(config.locked_poll_time, Duration::from_secs(15));
        assert_eq!(config.lock_lost_filter_time, Duration::from_secs(10));
        assert_eq!(config.extra_time_after_lock, Duration::from_secs(2));
        assert_eq!(config.first_fix_timeout, Some(Duration::from_secs(120)));
        assert!(!config.publish_satellite_changes);
    }

    #[test]
    fn test_tracking_builder() {
        let config = TrackingConfig::new()
            .with_required_accuracy(10.0)
            .with_locked_poll_time(Duration::from_secs(30))
            .with_lock_lost_filter_time(Duration::from_secs(5))
            .with_extra_time_after_lock(Duration::from_secs(1))
            .with_first_fix_timeout(None)
            .with_publish_satellite_changes(true);

        assert_eq!(config.required_accuracy_m, 10.0);
        assert_eq!(config.locked_poll_time, Duration::from_secs(30));
        assert_eq!(config.lock_lost_filter_time, Duration::from_secs(5));
        assert_eq!(config.extra_time_after_lock, Duration::from_secs(1));
        assert_eq!(config.first_fix_timeout, None);
        assert!(config.publish_satellite_changes);
    }

    #[test]
    fn test_service_config_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
        assert_eq!(config.tracking, TrackingConfig::default());
    }
}
