//! Run command - track with the simulated receiver.

use std::sync::Arc;
use std::time::Duration;

use gpstracker::sensor::SimulatedReceiver;

use super::session;
use crate::error::CliError;
use crate::output::Printer;
use crate::runner::{shutdown_on_ctrlc, CliRunner};

/// Arguments for the run command.
pub struct RunArgs {
    pub duration: Option<u64>,
    pub json: bool,
    pub log_level: Option<String>,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.log_level)?;
    runner.log_startup("run");

    let service_config = runner.config().service.clone();
    let limit = args.duration.map(Duration::from_secs);
    let printer = Printer::new(args.json);

    let receiver = SimulatedReceiver::default();
    let simulation = receiver.config().clone();

    printer.banner(
        &format!("GPS Tracker v{} (simulated receiver)", gpstracker::VERSION),
        &[
            (
                "Origin",
                format!("{:.4}, {:.4}", simulation.origin.0, simulation.origin.1),
            ),
            ("Satellites", simulation.satellites.to_string()),
            (
                "Dropouts",
                simulation
                    .dropout_every
                    .map(|every| format!("every {} ticks", every))
                    .unwrap_or_else(|| "off".to_string()),
            ),
            (
                "Accuracy",
                format!("{} m required", service_config.tracking.required_accuracy_m),
            ),
            (
                "Duration",
                limit
                    .map(|d| format!("{}s", d.as_secs()))
                    .unwrap_or_else(|| "until Ctrl+C".to_string()),
            ),
        ],
    );

    let shutdown = shutdown_on_ctrlc()?;
    let status = runner.block_on(session::drive(
        service_config,
        Arc::new(receiver),
        printer,
        limit,
        shutdown,
    ))?;

    printer.summary(&status);
    Ok(())
}
