//! Named configuration keys (`section.key`) for get/set access.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::{ConfigError, ConfigFile};

/// A single setting in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    TrackingRequiredAccuracy,
    TrackingLockedPollMs,
    TrackingLockLostFilterMs,
    TrackingExtraTimeAfterLockMs,
    TrackingFirstFixTimeoutMs,
    TrackingPublishSatelliteChanges,
    ServiceBroadcastCapacity,
    LoggingLevel,
    LoggingDirectory,
    LoggingFile,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::TrackingRequiredAccuracy,
            ConfigKey::TrackingLockedPollMs,
            ConfigKey::TrackingLockLostFilterMs,
            ConfigKey::TrackingExtraTimeAfterLockMs,
            ConfigKey::TrackingFirstFixTimeoutMs,
            ConfigKey::TrackingPublishSatelliteChanges,
            ConfigKey::ServiceBroadcastCapacity,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
            ConfigKey::LoggingFile,
        ]
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::TrackingRequiredAccuracy
            | ConfigKey::TrackingLockedPollMs
            | ConfigKey::TrackingLockLostFilterMs
            | ConfigKey::TrackingExtraTimeAfterLockMs
            | ConfigKey::TrackingFirstFixTimeoutMs
            | ConfigKey::TrackingPublishSatelliteChanges => "tracking",
            ConfigKey::ServiceBroadcastCapacity => "service",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory | ConfigKey::LoggingFile => {
                "logging"
            }
        }
    }

    /// Key within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::TrackingRequiredAccuracy => "required_accuracy",
            ConfigKey::TrackingLockedPollMs => "locked_poll_ms",
            ConfigKey::TrackingLockLostFilterMs => "lock_lost_filter_ms",
            ConfigKey::TrackingExtraTimeAfterLockMs => "extra_time_after_lock_ms",
            ConfigKey::TrackingFirstFixTimeoutMs => "first_fix_timeout_ms",
            ConfigKey::TrackingPublishSatelliteChanges => "publish_satellite_changes",
            ConfigKey::ServiceBroadcastCapacity => "broadcast_capacity",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
            ConfigKey::LoggingFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text.
    pub fn get(&self, config: &ConfigFile) -> String {
        let tracking = &config.service.tracking;
        match self {
            ConfigKey::TrackingRequiredAccuracy => tracking.required_accuracy_m.to_string(),
            ConfigKey::TrackingLockedPollMs => millis(tracking.locked_poll_time),
            ConfigKey::TrackingLockLostFilterMs => millis(tracking.lock_lost_filter_time),
            ConfigKey::TrackingExtraTimeAfterLockMs => millis(tracking.extra_time_after_lock),
            ConfigKey::TrackingFirstFixTimeoutMs => {
                tracking.first_fix_timeout.map(millis).unwrap_or_else(|| "0".to_string())
            }
            ConfigKey::TrackingPublishSatelliteChanges => {
                tracking.publish_satellite_changes.to_string()
            }
            ConfigKey::ServiceBroadcastCapacity => config.service.broadcast_capacity.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
            ConfigKey::LoggingFile => config.logging.file_enabled.to_string(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let tracking = &mut config.service.tracking;
        match self {
            ConfigKey::TrackingRequiredAccuracy => {
                let metres: f32 = self.parse(value)?;
                if !metres.is_finite() || metres <= 0.0 {
                    return Err(self.invalid(value, "must be a positive number of metres"));
                }
                tracking.required_accuracy_m = metres;
            }
            ConfigKey::TrackingLockedPollMs => {
                tracking.locked_poll_time = self.parse_duration(value)?;
            }
            ConfigKey::TrackingLockLostFilterMs => {
                tracking.lock_lost_filter_time = self.parse_duration(value)?;
            }
            ConfigKey::TrackingExtraTimeAfterLockMs => {
                tracking.extra_time_after_lock = self.parse_duration(value)?;
            }
            ConfigKey::TrackingFirstFixTimeoutMs => {
                let ms: u64 = self.parse(value)?;
                tracking.first_fix_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
            ConfigKey::TrackingPublishSatelliteChanges => {
                tracking.publish_satellite_changes = self.parse_bool(value)?;
            }
            ConfigKey::ServiceBroadcastCapacity => {
                let capacity: usize = self.parse(value)?;
                if capacity == 0 {
                    return Err(self.invalid(value, "must be at least 1"));
                }
                config.service.broadcast_capacity = capacity;
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = PathBuf::from(value);
            }
            ConfigKey::LoggingFile => {
                config.logging.file_enabled = self.parse_bool(value)?;
            }
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value
            .parse::<T>()
            .map_err(|e| self.invalid(value, &e.to_string()))
    }

    fn parse_duration(&self, value: &str) -> Result<Duration, ConfigError> {
        let ms: u64 = self.parse(value)?;
        if ms == 0 {
            return Err(self.invalid(value, "must be at least 1 ms"));
        }
        Ok(Duration::from_millis(ms))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
    }

    #[test]
    fn test_unknown_key() {
        let err = "tracking.nope".parse::<ConfigKey>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn test_get_set_durations() {
        let mut config = ConfigFile::default();
        ConfigKey::TrackingLockLostFilterMs
            .set(&mut config, "2500")
            .unwrap();
        assert_eq!(
            config.service.tracking.lock_lost_filter_time,
            Duration::from_millis(2500)
        );
        assert_eq!(ConfigKey::TrackingLockLostFilterMs.get(&config), "2500");
    }

    #[test]
    fn test_zero_disables_first_fix_timeout() {
        let mut config = ConfigFile::default();
        ConfigKey::TrackingFirstFixTimeoutMs
            .set(&mut config, "0")
            .unwrap();
        assert_eq!(config.service.tracking.first_fix_timeout, None);
        assert_eq!(ConfigKey::TrackingFirstFixTimeoutMs.get(&config), "0");
    }

    #[test]
    fn test_rejects_zero_duration() {
        let mut config = ConfigFile::default();
        let err = ConfigKey::TrackingLockedPollMs
            .set(&mut config, "0")
            .unwrap_err();
        assert!(err.to_string().contains("tracking.locked_poll_ms"));
    }

    #[test]
    fn test_bool_spellings() {
        let mut config = ConfigFile::default();
        ConfigKey::LoggingFile.set(&mut config, "off").unwrap();
        assert!(!config.logging.file_enabled);
        ConfigKey::LoggingFile.set(&mut config, "Yes").unwrap();
        assert!(config.logging.file_enabled);
        assert!(ConfigKey::LoggingFile.set(&mut config, "maybe").is_err());
    }

    #[test]
    fn test_rejects_negative_accuracy() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::TrackingRequiredAccuracy
            .set(&mut config, "-3")
            .is_err());
    }
}
