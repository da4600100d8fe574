//! Replay command - track with a recorded event script.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gpstracker::config::TrackingConfig;
use gpstracker::sensor::{ScriptedReceiver, SensorScript};

use super::session;
use crate::error::CliError;
use crate::output::Printer;
use crate::runner::{shutdown_on_ctrlc, CliRunner};

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub script: PathBuf,
    pub json: bool,
    pub settle: Option<u64>,
    pub log_level: Option<String>,
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.log_level)?;
    runner.log_startup("replay");

    let script = SensorScript::load(&args.script)?;
    let service_config = runner.config().service.clone();
    let settle = settle_time(args.settle, &service_config.tracking);
    let limit = script.span() + settle;
    let printer = Printer::new(args.json);

    printer.banner(
        &format!("GPS Tracker v{} (replay)", gpstracker::VERSION),
        &[
            ("Script", args.script.display().to_string()),
            ("Entries", script.len().to_string()),
            ("Span", format!("{:.1}s", script.span().as_secs_f64())),
            ("Settle", format!("{:.1}s", settle.as_secs_f64())),
        ],
    );

    let shutdown = shutdown_on_ctrlc()?;
    let status = runner.block_on(session::drive(
        service_config,
        Arc::new(ScriptedReceiver::new(script)),
        printer,
        Some(limit),
        shutdown,
    ))?;

    printer.summary(&status);
    Ok(())
}

/// Time to keep running after the last script entry, so pending debounce
/// windows can expire. Defaults to the lock-lost filter time plus a second.
fn settle_time(cli_settle: Option<u64>, tracking: &TrackingConfig) -> Duration {
    cli_settle
        .map(Duration::from_secs)
        .unwrap_or(tracking.lock_lost_filter_time + Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_defaults_past_lock_lost_filter() {
        let tracking = TrackingConfig::default().with_lock_lost_filter_time(Duration::from_secs(4));
        assert_eq!(settle_time(None, &tracking), Duration::from_secs(5));
    }

    #[test]
    fn test_demo_script_parses() {
        let script = SensorScript::parse(include_str!("../../../demos/urban_drive.jsonl")).unwrap();
        assert_eq!(script.len(), 15);
        assert_eq!(script.span(), Duration::from_secs(58));
    }

    #[test]
    fn test_settle_from_cli_wins() {
        assert_eq!(
            settle_time(Some(0), &TrackingConfig::default()),
            Duration::ZERO
        );
    }
}
