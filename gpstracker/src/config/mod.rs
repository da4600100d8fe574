//! Configuration for the tracker service.
//!
//! - [`TrackingConfig`] / [`ServiceConfig`] - runtime settings handed to
//!   [`TrackerService::start`](crate::service::TrackerService::start)
//! - [`ConfigFile`] - the user's INI file, which carries a `ServiceConfig`
//!   plus logging settings
//! - [`ConfigKey`] - `section.key` access used by the CLI `config` commands

mod file;
mod keys;
mod settings;

pub use file::{config_file_path, ConfigError, ConfigFile};
pub use keys::ConfigKey;
pub use settings::{
    ServiceConfig, TrackingConfig, DEFAULT_BROADCAST_CAPACITY, DEFAULT_EXTRA_TIME_AFTER_LOCK,
    DEFAULT_FIRST_FIX_TIMEOUT, DEFAULT_LOCKED_POLL_TIME, DEFAULT_LOCK_LOST_FILTER_TIME,
    DEFAULT_REQUIRED_ACCURACY_M,
};
