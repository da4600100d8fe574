//! Receiver that synthesises GPS traffic.
//!
//! Models a receiver that takes a while to acquire on a cold start, then
//! reports a fix whose accuracy improves each tick, with periodic dropouts
//! during which no satellite is used in the fix. After the first
//! acquisition the receiver is warm and re-acquires on the first tick of
//! every later subscription.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{GpsReceiver, SensorError, SensorSink};
use crate::tracking::{LocationSample, SatelliteInfo};

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Interval between reports.
    pub tick: Duration,
    /// Satellites in view once acquired.
    pub satellites: u16,
    /// Ticks from a cold start to the first fix.
    pub acquisition_ticks: u64,
    /// A dropout starts every this many ticks. `None` disables dropouts.
    pub dropout_every: Option<u64>,
    /// Length of a dropout in ticks.
    pub dropout_ticks: u64,
    /// Accuracy of the first fix, in metres.
    pub initial_accuracy_m: f32,
    /// Best accuracy the fix converges to, in metres.
    pub best_accuracy_m: f32,
    /// Starting position (latitude, longitude).
    pub origin: (f64, f64),
    /// Altitude reported with each fix.
    pub altitude_m: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            satellites: 9,
            acquisition_ticks: 6,
            dropout_every: Some(45),
            dropout_ticks: 4,
            initial_accuracy_m: 60.0,
            best_accuracy_m: 4.0,
            origin: (51.4779, -0.0015),
            altitude_m: 46.0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    /// Ticks since the first subscription, across sessions.
    tick: u64,
    warm: bool,
    ticks_with_fix: u32,
    provider_enabled: bool,
    sink: Option<SensorSink>,
    session: Option<CancellationToken>,
}

/// A [`GpsReceiver`] producing synthetic satellite, location and NMEA
/// reports.
#[derive(Debug)]
pub struct SimulatedReceiver {
    config: SimulationConfig,
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedReceiver {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

/// Shortest tick the simulation runs at.
pub const MIN_SIMULATION_TICK: Duration = Duration::from_millis(1);

impl SimulatedReceiver {
    /// A `tick` below [`MIN_SIMULATION_TICK`] is raised to it.
    pub fn new(mut config: SimulationConfig) -> Self {
        if config.tick < MIN_SIMULATION_TICK {
            warn!(tick_ms = config.tick.as_millis() as u64, "Simulation tick too short, using 1 ms");
            config.tick = MIN_SIMULATION_TICK;
        }
        Self {
            config,
            state: Arc::new(Mutex::new(SimState {
                tick: 0,
                warm: false,
                ticks_with_fix: 0,
                provider_enabled: true,
                sink: None,
                session: None,
            })),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Switch the simulated provider on or off, notifying a subscribed
    /// tracker.
    pub fn set_provider_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        if state.provider_enabled == enabled {
            return;
        }
        state.provider_enabled = enabled;
        info!(enabled, "Simulated provider switched");
        if let Some(sink) = &state.sink {
            let result = if enabled {
                sink.provider_enabled()
            } else {
                sink.provider_disabled()
            };
            if result.is_err() {
                debug!("Dispatcher closed, provider switch not delivered");
            }
        }
    }

    /// Ticks simulated so far.
    pub fn ticks(&self) -> u64 {
        self.state.lock().tick
    }
}

impl GpsReceiver for SimulatedReceiver {
    fn request_updates(&self, sink: SensorSink) -> Result<(), SensorError> {
        let runtime = Handle::try_current()
            .map_err(|_| SensorError::Unavailable("no tokio runtime for simulation".into()))?;

        let mut state = self.state.lock();
        if let Some(previous) = state.session.take() {
            previous.cancel();
        }
        let session = CancellationToken::new();
        state.session = Some(session.clone());
        state.sink = Some(sink.clone());
        state.ticks_with_fix = 0;
        debug!(tick = state.tick, warm = state.warm, "Simulation subscribed");
        drop(state);

        runtime.spawn(simulate(
            self.config.clone(),
            Arc::clone(&self.state),
            sink,
            session,
        ));
        Ok(())
    }

    fn remove_updates(&self) -> Result<(), SensorError> {
        let mut state = self.state.lock();
        state.sink = None;
        if let Some(session) = state.session.take() {
            session.cancel();
            debug!(tick = state.tick, "Simulation unsubscribed");
        }
        Ok(())
    }

    fn is_provider_enabled(&self) -> Result<bool, SensorError> {
        Ok(self.state.lock().provider_enabled)
    }
}

/// One simulated report.
#[derive(Debug, Clone, PartialEq)]
struct Report {
    satellites: Vec<SatelliteInfo>,
    location: Option<LocationSample>,
}

async fn simulate(
    config: SimulationConfig,
    state: Arc<Mutex<SimState>>,
    sink: SensorSink,
    session: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = session.cancelled() => return,

            _ = ticker.tick() => {}
        }

        let (report, tick) = {
            let mut state = state.lock();
            if session.is_cancelled() {
                return;
            }
            if !state.provider_enabled {
                continue;
            }
            let report = next_report(&config, &mut state);
            (report, state.tick)
        };

        let mut delivered = sink.satellites(&report.satellites).is_ok();
        if let Some(location) = report.location {
            let sentence = gga_sentence(&location, &report.satellites);
            delivered &= sink
                .nmea(location.timestamp.timestamp_millis(), sentence)
                .is_ok();
            delivered &= sink.location(location).is_ok();
        }
        if !delivered {
            debug!(tick, "Dispatcher closed, simulation stopped");
            return;
        }
    }
}

/// Advance the simulation by one tick.
fn next_report(config: &SimulationConfig, state: &mut SimState) -> Report {
    state.tick += 1;
    let tick = state.tick;

    let acquiring = !state.warm && tick <= config.acquisition_ticks;
    let dropout = config
        .dropout_every
        .filter(|every| *every > 0)
        .map(|every| {
            tick > config.acquisition_ticks && tick >= every && tick % every < config.dropout_ticks
        })
        .unwrap_or(false);

    let in_view = if acquiring {
        let ramp = tick * u64::from(config.satellites) / config.acquisition_ticks.max(1);
        ramp.min(u64::from(config.satellites)) as u16
    } else {
        config.satellites
    };
    let has_fix = !acquiring && !dropout;
    let in_fix = if has_fix { in_view.saturating_sub(2).max(1) } else { 0 };

    let satellites = (0..in_view)
        .map(|index| SatelliteInfo {
            prn: 2 + index * 3,
            snr: 20.0 + f32::from(index % 5) * 5.0,
            used_in_fix: index < in_fix,
        })
        .collect();

    let location = if has_fix {
        state.warm = true;
        let accuracy = (config.initial_accuracy_m / 2f32.powi(state.ticks_with_fix as i32))
            .max(config.best_accuracy_m);
        state.ticks_with_fix = state.ticks_with_fix.saturating_add(1);
        // Drift a few metres north-east per tick.
        let drift = tick as f64 * 0.00002;
        Some(
            LocationSample::new(config.origin.0 + drift, config.origin.1 + drift, accuracy)
                .with_altitude(config.altitude_m),
        )
    } else {
        state.ticks_with_fix = 0;
        None
    };

    Report {
        satellites,
        location,
    }
}

/// A GGA sentence for `location`, with checksum.
fn gga_sentence(location: &LocationSample, satellites: &[SatelliteInfo]) -> String {
    let used = satellites.iter().filter(|s| s.used_in_fix).count();
    let body = format!(
        "GPGGA,{},{},{},{},{},1,{:02},{:.1},{:.1},M,,M,,",
        Utc::now().format("%H%M%S%.3f"),
        nmea_angle(location.latitude.abs(), 2),
        if location.latitude >= 0.0 { 'N' } else { 'S' },
        nmea_angle(location.longitude.abs(), 3),
        if location.longitude >= 0.0 { 'E' } else { 'W' },
        used,
        location.accuracy_m / 5.0,
        location.altitude_m.unwrap_or_default(),
    );
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}\r\n", body, checksum)
}

/// Degrees as NMEA `dddmm.mmmm`.
fn nmea_angle(degrees: f64, width: usize) -> String {
    let whole = degrees.trunc();
    let minutes = (degrees - whole) * 60.0;
    format!("{:0width$}{:07.4}", whole as u32, minutes, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{DispatchMessage, DispatcherHandle};
    use crate::sensor::SensorEvent;

    fn state() -> SimState {
        SimState {
            tick: 0,
            warm: false,
            ticks_with_fix: 0,
            provider_enabled: true,
            sink: None,
            session: None,
        }
    }

    #[test]
    fn test_zero_tick_is_raised() {
        let receiver = SimulatedReceiver::new(SimulationConfig {
            tick: Duration::ZERO,
            ..SimulationConfig::default()
        });
        assert_eq!(receiver.config().tick, MIN_SIMULATION_TICK);
    }

    #[test]
    fn test_cold_start_then_fix() {
        let config = SimulationConfig {
            acquisition_ticks: 3,
            dropout_every: None,
            ..SimulationConfig::default()
        };
        let mut state = state();

        for _ in 0..3 {
            let report = next_report(&config, &mut state);
            assert!(report.location.is_none());
            assert!(report.satellites.iter().all(|s| !s.used_in_fix));
        }

        let report = next_report(&config, &mut state);
        assert_eq!(report.satellites.len(), 9);
        assert_eq!(report.satellites.iter().filter(|s| s.used_in_fix).count(), 7);
        assert_eq!(report.location.unwrap().accuracy_m, 60.0);
        assert!(state.warm);
    }

    #[test]
    fn test_accuracy_converges() {
        let config = SimulationConfig {
            acquisition_ticks: 0,
            dropout_every: None,
            ..SimulationConfig::default()
        };
        let mut state = state();
        let accuracies: Vec<f32> = (0..6)
            .map(|_| next_report(&config, &mut state).location.unwrap().accuracy_m)
            .collect();
        assert_eq!(accuracies, vec![60.0, 30.0, 15.0, 7.5, 4.0, 4.0]);
    }

    #[test]
    fn test_dropout_clears_fix() {
        let config = SimulationConfig {
            acquisition_ticks: 0,
            dropout_every: Some(10),
            dropout_ticks: 2,
            ..SimulationConfig::default()
        };
        let mut state = state();
        let fixes: Vec<bool> = (0..12)
            .map(|_| next_report(&config, &mut state).location.is_some())
            .collect();
        // Ticks 10 and 11 are inside the dropout.
        assert_eq!(&fixes[8..12], &[true, false, false, true]);
    }

    #[test]
    fn test_gga_checksum() {
        let location = LocationSample::new(51.5, -0.25, 10.0).with_altitude(12.0);
        let sentence = gga_sentence(&location, &[]);
        assert!(sentence.starts_with("$GPGGA,"));
        assert!(sentence.contains(",5130.0000,N,00015.0000,W,1,00,"));

        let (body, checksum) = sentence.trim_end()[1..].split_once('*').unwrap();
        let expected = body.bytes().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(checksum, format!("{:02X}", expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_until_unsubscribed() {
        let receiver = SimulatedReceiver::new(SimulationConfig {
            acquisition_ticks: 1,
            dropout_every: None,
            ..SimulationConfig::default()
        });
        let (handle, mut rx) = DispatcherHandle::channel();

        receiver.request_updates(handle.sensor_sink()).unwrap();
        let mut locations = 0;
        while locations < 2 {
            if let Some(DispatchMessage::Sensor(SensorEvent::Location(_))) = rx.recv().await {
                locations += 1;
            }
        }

        receiver.remove_updates().unwrap();
        let ticks = receiver.ticks();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(receiver.ticks(), ticks);
    }

    #[tokio::test]
    async fn test_provider_switch_notifies_subscriber() {
        let receiver = SimulatedReceiver::new(SimulationConfig {
            tick: Duration::from_secs(3600),
            ..SimulationConfig::default()
        });
        let (handle, mut rx) = DispatcherHandle::channel();
        receiver.request_updates(handle.sensor_sink()).unwrap();

        receiver.set_provider_enabled(false);
        assert!(!receiver.is_provider_enabled().unwrap());

        loop {
            match rx.recv().await.unwrap() {
                DispatchMessage::Sensor(SensorEvent::ProviderDisabled) => break,
                DispatchMessage::Sensor(SensorEvent::Satellites(_)) => {}
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }
}
