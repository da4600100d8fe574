//! INI configuration file.
//!
//! ```ini
//! [tracking]
//! required_accuracy = 20
//! locked_poll_ms = 15000
//! lock_lost_filter_ms = 10000
//! extra_time_after_lock_ms = 2000
//! first_fix_timeout_ms = 120000
//! publish_satellite_changes = false
//!
//! [service]
//! broadcast_capacity = 64
//!
//! [logging]
//! level = info
//! directory = /home/pilot/.local/share/gpstracker/logs
//! file = true
//! ```
//!
//! Missing keys keep their defaults. Unknown keys are ignored with a warning.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::{debug, warn};

use super::keys::ConfigKey;
use super::settings::ServiceConfig;
use crate::logging::LoggingConfig;

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A key has a value of the wrong shape.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key is not a known `section.key` name.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Path of the user's configuration file (`<config>/gpstracker/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gpstracker")
        .join("config.ini")
}

/// Everything stored in the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// Service and state machine settings.
    pub service: ServiceConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            for (key, value) in properties.iter() {
                let name = format!("{}.{}", section, key);
                match name.parse::<ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => warn!(key = %name, "Ignoring unknown configuration key"),
                }
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parse_overrides_defaults() {
        let text = "\
[tracking]
required_accuracy = 12.5
lock_lost_filter_ms = 4000
first_fix_timeout_ms = 0

[logging]
level = debug
file = false
";
        let config = ConfigFile::parse(text).unwrap();
        assert_eq!(config.service.tracking.required_accuracy_m, 12.5);
        assert_eq!(
            config.service.tracking.lock_lost_filter_time,
            Duration::from_millis(4000)
        );
        assert_eq!(config.service.tracking.first_fix_timeout, None);
        assert_eq!(
            config.service.tracking.locked_poll_time,
            Duration::from_secs(15),
            "unset keys keep defaults"
        );
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.file_enabled);
    }

    #[test]
    fn test_parse_rejects_bad_value() {
        let err = ConfigFile::parse("[tracking]\nlocked_poll_ms = soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let config = ConfigFile::parse("[tracking]\nwarp_factor = 9\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.service.tracking.locked_poll_time = Duration::from_secs(30);
        config.service.tracking.publish_satellite_changes = true;
        config.logging.level = "warn".to_string();
        config.save_to(&path).unwrap();

        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
