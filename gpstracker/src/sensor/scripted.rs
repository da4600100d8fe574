//! Receiver that replays a recorded event script.
//!
//! A script is JSON lines, one event per line, with a time offset from the
//! first subscription:
//!
//! ```text
//! {"at_ms": 0,    "event": {"satellites": {"in_view": 0, "in_fix": 0}}}
//! {"at_ms": 1500, "event": {"satellites": {"in_view": 6, "in_fix": 3}}}
//! {"at_ms": 1600, "event": {"location": {"latitude": 51.5, "longitude": -0.12,
//!                  "accuracy_m": 8.0, "altitude_m": null, "timestamp": "2024-05-01T10:00:00Z"}}}
//! {"at_ms": 9000, "event": "provider_disabled"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Script time keeps
//! running while the tracker is unsubscribed; entries that fall due in that
//! gap are never delivered, apart from provider switches, which still update
//! what [`GpsReceiver::is_provider_enabled`] reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{GpsReceiver, SensorError, SensorEvent, SensorSink};

/// Errors loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Script line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Script line {line}: at_ms {at_ms} is earlier than the previous entry")]
    OutOfOrder { line: usize, at_ms: u64 },
}

/// One scripted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    /// Offset from the first subscription, in milliseconds.
    pub at_ms: u64,
    pub event: SensorEvent,
}

/// An ordered list of scripted events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorScript {
    entries: Vec<ScriptEntry>,
}

impl SensorScript {
    /// Build a script from entries, which must be in time order.
    pub fn new(entries: Vec<ScriptEntry>) -> Result<Self, ScriptError> {
        check_order(entries.iter().map(|e| e.at_ms).enumerate())?;
        Ok(Self { entries })
    }

    /// Parse JSON-lines text.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut entries = Vec::new();
        let mut numbered = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry: ScriptEntry =
                serde_json::from_str(trimmed).map_err(|e| ScriptError::Parse {
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            numbered.push((index, entry.at_ms));
            entries.push(entry);
        }
        check_order(numbered.into_iter())?;
        Ok(Self { entries })
    }

    /// Load a script file.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time of the last entry.
    pub fn span(&self) -> Duration {
        self.entries
            .last()
            .map(|e| Duration::from_millis(e.at_ms))
            .unwrap_or_default()
    }
}

fn check_order(times: impl Iterator<Item = (usize, u64)>) -> Result<(), ScriptError> {
    let mut previous = 0;
    for (index, at_ms) in times {
        if at_ms < previous {
            return Err(ScriptError::OutOfOrder {
                line: index + 1,
                at_ms,
            });
        }
        previous = at_ms;
    }
    Ok(())
}

#[derive(Debug)]
struct Playback {
    origin: Option<Instant>,
    cursor: usize,
    provider_enabled: bool,
    session: Option<CancellationToken>,
}

/// A [`GpsReceiver`] that replays a [`SensorScript`].
#[derive(Debug)]
pub struct ScriptedReceiver {
    script: Arc<SensorScript>,
    playback: Arc<Mutex<Playback>>,
}

impl ScriptedReceiver {
    pub fn new(script: SensorScript) -> Self {
        Self {
            script: Arc::new(script),
            playback: Arc::new(Mutex::new(Playback {
                origin: None,
                cursor: 0,
                provider_enabled: true,
                session: None,
            })),
        }
    }

    /// Whether every entry has been delivered or skipped.
    pub fn is_finished(&self) -> bool {
        self.playback.lock().cursor >= self.script.len()
    }

    /// Script length.
    pub fn span(&self) -> Duration {
        self.script.span()
    }
}

impl GpsReceiver for ScriptedReceiver {
    fn request_updates(&self, sink: SensorSink) -> Result<(), SensorError> {
        let runtime = Handle::try_current()
            .map_err(|_| SensorError::Unavailable("no tokio runtime for playback".into()))?;

        let mut playback = self.playback.lock();
        if let Some(previous) = playback.session.take() {
            previous.cancel();
        }
        let now = Instant::now();
        let origin = *playback.origin.get_or_insert(now);

        // Skip what fell due while unsubscribed.
        let mut skipped = 0;
        while let Some(entry) = self.script.entries.get(playback.cursor) {
            if origin + Duration::from_millis(entry.at_ms) >= now {
                break;
            }
            match entry.event {
                SensorEvent::ProviderEnabled => playback.provider_enabled = true,
                SensorEvent::ProviderDisabled => playback.provider_enabled = false,
                _ => {}
            }
            playback.cursor += 1;
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, "Script entries missed while unsubscribed");
        }

        let session = CancellationToken::new();
        playback.session = Some(session.clone());
        info!(
            cursor = playback.cursor,
            remaining = self.script.len() - playback.cursor,
            "Script playback subscribed"
        );
        drop(playback);

        runtime.spawn(play(
            Arc::clone(&self.script),
            Arc::clone(&self.playback),
            origin,
            sink,
            session,
        ));
        Ok(())
    }

    fn remove_updates(&self) -> Result<(), SensorError> {
        if let Some(session) = self.playback.lock().session.take() {
            session.cancel();
            debug!("Script playback unsubscribed");
        }
        Ok(())
    }

    fn is_provider_enabled(&self) -> Result<bool, SensorError> {
        Ok(self.playback.lock().provider_enabled)
    }
}

async fn play(
    script: Arc<SensorScript>,
    playback: Arc<Mutex<Playback>>,
    origin: Instant,
    sink: SensorSink,
    session: CancellationToken,
) {
    loop {
        let (entry, due) = {
            let playback = playback.lock();
            match script.entries.get(playback.cursor) {
                Some(entry) => (entry.clone(), origin + Duration::from_millis(entry.at_ms)),
                None => {
                    debug!("Script playback finished");
                    return;
                }
            }
        };

        tokio::select! {
            biased;

            _ = session.cancelled() => return,

            _ = tokio::time::sleep_until(due) => {}
        }

        {
            // Unsubscribing takes this lock too, so an entry is either
            // delivered or left for the next session, never both.
            let mut playback = playback.lock();
            if session.is_cancelled() {
                return;
            }
            match entry.event {
                SensorEvent::ProviderEnabled => playback.provider_enabled = true,
                SensorEvent::ProviderDisabled => playback.provider_enabled = false,
                _ => {}
            }
            playback.cursor += 1;
            trace!(at_ms = entry.at_ms, "Script entry delivered");
            if sink.send(entry.event).is_err() {
                debug!("Dispatcher closed, script playback stopped");
                return;
            }
        }
    }
}
