//! Rendering of tracker publishes for the terminal.
//!
//! Human mode prints one styled line per publish with the lock indicator as
//! a coloured dot. JSON mode prints one [`TrackerEvent`] per line.

use console::{style, StyledObject};
use gpstracker::broadcast::TrackerEvent;
use gpstracker::tracking::{LocationSample, LockIndicator, StatusRecord};
use tracing::warn;

/// Output mode chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print a `STATUS` publish.
    pub fn status(&self, status: &StatusRecord) {
        if self.json {
            self.print_json(&TrackerEvent::Status(*status));
        } else {
            println!(
                "{} {:<8} {}",
                indicator_dot(status.indicator()),
                style("STATUS").bold(),
                status
            );
        }
    }

    /// Print a `LOCATION` publish.
    pub fn location(&self, sample: &LocationSample) {
        if self.json {
            self.print_json(&TrackerEvent::Location(sample.clone()));
        } else {
            println!("  {:<8} {}", style("LOCATION").dim(), location_line(sample));
        }
    }

    /// Print the banner shown before a session starts. Suppressed in JSON
    /// mode.
    pub fn banner(&self, title: &str, details: &[(&str, String)]) {
        if self.json {
            return;
        }
        println!("{}", style(title).bold());
        println!("{}", "=".repeat(title.chars().count()));
        for (label, value) in details {
            println!("{:<12} {}", format!("{}:", label), value);
        }
        println!();
    }

    /// Print the status the service finished with.
    pub fn summary(&self, status: &StatusRecord) {
        if self.json {
            return;
        }
        println!();
        println!("Final status: {}", status);
    }

    fn print_json(&self, event: &TrackerEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(topic = event.topic(), error = %e, "Failed to encode event"),
        }
    }
}

/// Lock indicator as a coloured dot.
pub fn indicator_dot(indicator: LockIndicator) -> StyledObject<&'static str> {
    let dot = style("●");
    match indicator {
        LockIndicator::Grey => dot.dim(),
        LockIndicator::Red => dot.red(),
        LockIndicator::Yellow => dot.yellow(),
        LockIndicator::Green => dot.green(),
    }
}

/// Location line with the fix time.
pub fn location_line(sample: &LocationSample) -> String {
    format!("{} @ {}", sample, sample.timestamp.format("%H:%M:%S"))
}
