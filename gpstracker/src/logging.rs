//! Logging setup for the tracker.
//!
//! Installs a `tracing` subscriber with two outputs: a compact stderr layer
//! and, optionally, a daily rolling file in the configured log directory.
//! `RUST_LOG` overrides the configured level when set.
//!
//! # Example
//!
//! ```ignore
//! use gpstracker::logging::{init_logging, LoggingConfig};
//!
//! // Keep the guard alive for the whole process, or buffered file output
//! // is lost on exit.
//! let _guard = init_logging(&LoggingConfig::default())?;
//! tracing::info!("Tracker starting");
//! ```

use std::path::PathBuf;

use thiserror::Error;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default log level filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "gpstracker.log";

/// Errors setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level filter could not be parsed.
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// The log directory could not be created.
    #[error("Failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("Logging already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level filter directive, e.g. `info` or `gpstracker=debug`.
    pub level: String,

    /// Directory for rolling log files.
    pub directory: PathBuf,

    /// Whether to write log files at all.
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: default_log_dir(),
            file_enabled: true,
        }
    }
}

/// Default log directory (`<data-local>/gpstracker/logs`).
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gpstracker")
        .join("logs")
}

/// Keeps the non-blocking file writer flushing until dropped.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Build the level filter: `RUST_LOG` wins over the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.level)?;

    // Local offset lookup can fail on multi-threaded processes; fall back to UTC.
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[hour]:[minute]:[second].[subsecond digits:3]"),
    );

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone())
        .with_target(false)
        .compact();

    let (file_layer, file_guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.directory).map_err(|source| LoggingError::CreateDir {
            path: config.directory.clone(),
            source,
        })?;
        let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_timer(timer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
