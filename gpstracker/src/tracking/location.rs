//! Location samples and satellite reports from the receiver.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A position fix as reported by the receiver.
///
/// Passed through to subscribers unmodified; the state machine only reads
/// `accuracy_m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Estimated horizontal accuracy (68% radius) in metres.
    pub accuracy_m: f32,
    /// Altitude above WGS84 in metres, when the fix has one.
    pub altitude_m: Option<f64>,
    /// Time of the fix.
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// Create a sample stamped with the current time.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            altitude_m: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the altitude.
    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    /// Set an explicit timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for LocationSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.5}, {:.5} ±{:.0}m",
            self.latitude, self.longitude, self.accuracy_m
        )?;
        if let Some(altitude) = self.altitude_m {
            write!(f, " alt {:.0}m", altitude)?;
        }
        Ok(())
    }
}

/// One satellite from a receiver status report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    /// Pseudo-random noise code identifying the satellite.
    pub prn: u16,
    /// Signal to noise ratio in dB-Hz.
    pub snr: f32,
    /// Whether the satellite contributed to the last fix.
    pub used_in_fix: bool,
}

/// Satellite counts derived from a status report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SatelliteCounts {
    pub in_view: u32,
    pub in_fix: u32,
}

impl SatelliteCounts {
    pub fn new(in_view: u32, in_fix: u32) -> Self {
        Self { in_view, in_fix }
    }

    /// Count the satellites in view and those used in the fix.
    pub fn from_satellites(satellites: &[SatelliteInfo]) -> Self {
        let in_fix = satellites.iter().filter(|s| s.used_in_fix).count();
        Self {
            in_view: satellites.len() as u32,
            in_fix: in_fix as u32,
        }
    }

    /// Whether any satellite is used in the fix.
    pub fn has_fix(&self) -> bool {
        self.in_fix > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_from_satellites() {
        let satellites = [
            SatelliteInfo {
                prn: 3,
                snr: 31.0,
                used_in_fix: true,
            },
            SatelliteInfo {
                prn: 12,
                snr: 18.5,
                used_in_fix: false,
            },
            SatelliteInfo {
                prn: 25,
                snr: 40.0,
                used_in_fix: true,
            },
        ];
        let counts = SatelliteCounts::from_satellites(&satellites);
        assert_eq!(counts, SatelliteCounts::new(3, 2));
        assert!(counts.has_fix());
    }

    #[test]
    fn test_no_satellites_has_no_fix() {
        let counts = SatelliteCounts::from_satellites(&[]);
        assert_eq!(counts, SatelliteCounts::default());
        assert!(!counts.has_fix());
    }

    #[test]
    fn test_location_display() {
        let sample = LocationSample::new(51.5007, -0.1246, 8.4);
        assert_eq!(sample.to_string(), "51.50070, -0.12460 ±8m");

        let sample = sample.with_altitude(35.2);
        assert_eq!(sample.to_string(), "51.50070, -0.12460 ±8m alt 35m");
    }

    #[test]
    fn test_location_json_round_trip() {
        let sample = LocationSample::new(48.8584, 2.2945, 12.0).with_altitude(33.0);
        let json = serde_json::to_string(&sample).unwrap();
        let back: LocationSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}
