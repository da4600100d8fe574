//! CLI error type.

use std::fmt;

use gpstracker::config::ConfigError;
use gpstracker::logging::LoggingError;
use gpstracker::sensor::ScriptError;
use gpstracker::service::ServiceError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be read, validated or written.
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The async runtime could not be created.
    Runtime(std::io::Error),
    /// The tracker service failed to start or stop.
    Service(ServiceError),
    /// A replay script could not be loaded.
    Script(ScriptError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Service(e) => write!(f, "Service error: {}", e),
            CliError::Script(e) => write!(f, "Script error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<ScriptError> for CliError {
    fn from(e: ScriptError) -> Self {
        CliError::Script(e)
    }
}
