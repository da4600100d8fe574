//! Shared setup for commands that run the tracker service.

use std::future::Future;

use gpstracker::config::ConfigFile;
use gpstracker::logging::{init_logging, LoggingGuard};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Loaded configuration, installed logging and a tokio runtime.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load the config file and initialise logging.
    ///
    /// `log_level` overrides the configured level when given.
    pub fn new(log_level: Option<String>) -> Result<Self, CliError> {
        let mut config = ConfigFile::load()?;
        if let Some(level) = log_level {
            config.logging.level = level;
        }

        let logging = init_logging(&config.logging)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("gpstracker")
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log the command being run along with the effective settings.
    pub fn log_startup(&self, command: &str) {
        let tracking = &self.config.service.tracking;
        info!(
            command,
            version = gpstracker::VERSION,
            required_accuracy_m = tracking.required_accuracy_m,
            log_dir = %self.config.logging.directory.display(),
            "gpstracker starting"
        );
    }

    /// Run a future to completion on the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Install a Ctrl+C handler that cancels the returned token.
pub fn shutdown_on_ctrlc() -> Result<CancellationToken, CliError> {
    let token = CancellationToken::new();
    let signalled = token.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received shutdown signal, stopping...");
        signalled.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;
    Ok(token)
}
