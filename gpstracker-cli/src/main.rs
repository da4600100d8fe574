//! GPS Tracker CLI
//!
//! Command-line front end for the gpstracker library: run a tracking session
//! against the simulated receiver or a recorded script, and manage the
//! configuration file.

mod commands;
mod error;
mod output;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use commands::run::RunArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "gpstracker")]
#[command(version = gpstracker::VERSION)]
#[command(about = "Debounced GPS lock tracking with start/stop logging control", long_about = None)]
struct Cli {
    /// Log level filter (overrides the config file; RUST_LOG overrides both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track with the simulated receiver
    Run {
        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(long)]
        duration: Option<u64>,

        /// Print one JSON event per line
        #[arg(long)]
        json: bool,
    },

    /// Track with a recorded JSON-lines event script
    Replay {
        /// Path to the script
        script: PathBuf,

        /// Print one JSON event per line
        #[arg(long)]
        json: bool,

        /// Seconds to keep running after the last entry (default: lock-lost
        /// filter time plus one second)
        #[arg(long)]
        settle: Option<u64>,
    },

    /// Write the configuration file
    Init,

    /// View or modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run { duration, json } => commands::run::run(RunArgs {
            duration,
            json,
            log_level: cli.log_level,
        }),
        Commands::Replay {
            script,
            json,
            settle,
        } => commands::replay::run(ReplayArgs {
            script,
            json,
            settle,
            log_level: cli.log_level,
        }),
        Commands::Init => commands::init::run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
