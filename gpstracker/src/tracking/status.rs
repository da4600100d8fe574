//! Tracking status record and its flat integer encoding.
//!
//! The enum ordinals are a wire contract: [`StatusRecord::encode`] writes
//! them as plain integers for consumers on the far side of a binding. Never
//! reorder or insert variants without migrating those consumers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors decoding a flat status record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// An ordinal did not map to a variant.
    #[error("Invalid {field} ordinal: {value}")]
    InvalidOrdinal { field: &'static str, value: i32 },

    /// A satellite count was negative.
    #[error("Invalid {field}: {value} (must not be negative)")]
    NegativeCount { field: &'static str, value: i32 },

    /// The encoded record had the wrong number of fields.
    #[error("Status record needs {expected} fields, got {actual}")]
    Length { expected: usize, actual: usize },

    /// A command code did not map to a command.
    #[error("Unknown command code: {0}")]
    UnknownCommand(i32),
}

/// Whether position logging is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoggingState {
    /// No status received yet (client side only).
    Unknown,
    /// Sensor subscribed, positions are being logged.
    Logging,
    /// Logging stopped, sensor released.
    Stopped,
}

impl LoggingState {
    /// Wire ordinal.
    pub fn ordinal(self) -> i32 {
        match self {
            LoggingState::Unknown => 0,
            LoggingState::Logging => 1,
            LoggingState::Stopped => 2,
        }
    }

    /// Decode a wire ordinal.
    pub fn from_ordinal(value: i32) -> Result<Self, WireError> {
        match value {
            0 => Ok(LoggingState::Unknown),
            1 => Ok(LoggingState::Logging),
            2 => Ok(LoggingState::Stopped),
            _ => Err(WireError::InvalidOrdinal {
                field: "logging state",
                value,
            }),
        }
    }
}

impl fmt::Display for LoggingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoggingState::Unknown => "Unknown",
            LoggingState::Logging => "Logging",
            LoggingState::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

/// Debounced state of the GPS provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderState {
    /// Provider switched off by the user or unavailable.
    Disabled,
    /// Provider on, no usable fix.
    NoLock,
    /// Sustained fix.
    Locked,
}

impl ProviderState {
    /// Wire ordinal.
    pub fn ordinal(self) -> i32 {
        match self {
            ProviderState::Disabled => 0,
            ProviderState::NoLock => 1,
            ProviderState::Locked => 2,
        }
    }

    /// Decode a wire ordinal.
    pub fn from_ordinal(value: i32) -> Result<Self, WireError> {
        match value {
            0 => Ok(ProviderState::Disabled),
            1 => Ok(ProviderState::NoLock),
            2 => Ok(ProviderState::Locked),
            _ => Err(WireError::InvalidOrdinal {
                field: "provider state",
                value,
            }),
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderState::Disabled => "Disabled",
            ProviderState::NoLock => "No lock",
            ProviderState::Locked => "Locked",
        };
        f.write_str(s)
    }
}

/// Lock indicator shown by status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockIndicator {
    /// Not logging (or status unknown).
    Grey,
    /// Provider disabled.
    Red,
    /// Searching for a fix.
    Yellow,
    /// Locked.
    Green,
}

/// Number of integers in the flat encoding of a [`StatusRecord`].
pub const STATUS_WIRE_LEN: usize = 4;

/// Snapshot of the tracking state.
///
/// The state machine owns the live copy; everything else receives copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusRecord {
    pub logging_state: LoggingState,
    pub provider_state: ProviderState,
    pub satellites_in_view: u32,
    pub satellites_in_fix: u32,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            logging_state: LoggingState::Stopped,
            provider_state: ProviderState::Disabled,
            satellites_in_view: 0,
            satellites_in_fix: 0,
        }
    }
}

impl StatusRecord {
    /// Create a status record.
    pub fn new(
        logging_state: LoggingState,
        provider_state: ProviderState,
        satellites_in_view: u32,
        satellites_in_fix: u32,
    ) -> Self {
        Self {
            logging_state,
            provider_state,
            satellites_in_view,
            satellites_in_fix,
        }
    }

    /// Flat encoding: `[logging, provider, in_view, in_fix]`.
    ///
    /// Counts above `i32::MAX` saturate.
    pub fn encode(&self) -> [i32; STATUS_WIRE_LEN] {
        [
            self.logging_state.ordinal(),
            self.provider_state.ordinal(),
            saturate(self.satellites_in_view),
            saturate(self.satellites_in_fix),
        ]
    }

    /// Decode the flat encoding produced by [`encode`](Self::encode).
    pub fn decode(fields: &[i32]) -> Result<Self, WireError> {
        let [logging, provider, in_view, in_fix] = <[i32; STATUS_WIRE_LEN]>::try_from(fields)
            .map_err(|_| WireError::Length {
                expected: STATUS_WIRE_LEN,
                actual: fields.len(),
            })?;

        Ok(Self {
            logging_state: LoggingState::from_ordinal(logging)?,
            provider_state: ProviderState::from_ordinal(provider)?,
            satellites_in_view: count("satellites in view", in_view)?,
            satellites_in_fix: count("satellites in fix", in_fix)?,
        })
    }

    /// Whether position logging is running.
    pub fn is_logging(&self) -> bool {
        self.logging_state == LoggingState::Logging
    }

    /// Lock indicator colour for displays.
    pub fn indicator(&self) -> LockIndicator {
        if !self.is_logging() {
            return LockIndicator::Grey;
        }
        match self.provider_state {
            ProviderState::Disabled => LockIndicator::Red,
            ProviderState::NoLock => LockIndicator::Yellow,
            ProviderState::Locked => LockIndicator::Green,
        }
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | view {} fix {}",
            self.logging_state, self.provider_state, self.satellites_in_view, self.satellites_in_fix
        )
    }
}

fn saturate(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn count(field: &'static str, value: i32) -> Result<u32, WireError> {
    u32::try_from(value).map_err(|_| WireError::NegativeCount { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_is_stopped_and_disabled() {
        let status = StatusRecord::default();
        assert_eq!(status.logging_state, LoggingState::Stopped);
        assert_eq!(status.provider_state, ProviderState::Disabled);
        assert_eq!(status.satellites_in_view, 0);
        assert_eq!(status.satellites_in_fix, 0);
    }

    #[test]
    fn test_encode_logging_locked_round_trip() {
        let status = StatusRecord::new(LoggingState::Logging, ProviderState::Locked, 7, 4);
        let encoded = status.encode();
        assert_eq!(encoded, [1, 2, 7, 4]);
        assert_eq!(StatusRecord::decode(&encoded).unwrap(), status);
    }

    #[test]
    fn test_ordinals_are_stable() {
        assert_eq!(LoggingState::Unknown.ordinal(), 0);
        assert_eq!(LoggingState::Logging.ordinal(), 1);
        assert_eq!(LoggingState::Stopped.ordinal(), 2);
        assert_eq!(ProviderState::Disabled.ordinal(), 0);
        assert_eq!(ProviderState::NoLock.ordinal(), 1);
        assert_eq!(ProviderState::Locked.ordinal(), 2);
    }

    #[test]
    fn test_decode_rejects_bad_ordinal() {
        let err = StatusRecord::decode(&[1, 3, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            WireError::InvalidOrdinal {
                field: "provider state",
                value: 3
            }
        );
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = StatusRecord::decode(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            WireError::Length {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_decode_rejects_negative_count() {
        let err = StatusRecord::decode(&[1, 2, -1, 0]).unwrap_err();
        assert!(matches!(err, WireError::NegativeCount { .. }));
    }

    #[test]
    fn test_indicator_colours() {
        let mut status = StatusRecord::default();
        assert_eq!(status.indicator(), LockIndicator::Grey);

        status.logging_state = LoggingState::Logging;
        assert_eq!(status.indicator(), LockIndicator::Red);
        status.provider_state = ProviderState::NoLock;
        assert_eq!(status.indicator(), LockIndicator::Yellow);
        status.provider_state = ProviderState::Locked;
        assert_eq!(status.indicator(), LockIndicator::Green);
    }

    #[test]
    fn test_display() {
        let status = StatusRecord::new(LoggingState::Logging, ProviderState::NoLock, 5, 0);
        assert_eq!(status.to_string(), "Logging | No lock | view 5 fix 0");
    }

    #[test]
    fn test_json_uses_named_tags() {
        let status = StatusRecord::new(LoggingState::Logging, ProviderState::Locked, 7, 4);
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"Logging\""));
        assert!(json.contains("\"Locked\""));
        let back: StatusRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    fn any_logging_state() -> impl Strategy<Value = LoggingState> {
        prop_oneof![
            Just(LoggingState::Unknown),
            Just(LoggingState::Logging),
            Just(LoggingState::Stopped),
        ]
    }

    fn any_provider_state() -> impl Strategy<Value = ProviderState> {
        prop_oneof![
            Just(ProviderState::Disabled),
            Just(ProviderState::NoLock),
            Just(ProviderState::Locked),
        ]
    }

    proptest! {
        #[test]
        fn prop_encoding_round_trips(
            logging in any_logging_state(),
            provider in any_provider_state(),
            in_view in 0u32..=i32::MAX as u32,
            in_fix in 0u32..=i32::MAX as u32,
        ) {
            let status = StatusRecord::new(logging, provider, in_view, in_fix);
            prop_assert_eq!(StatusRecord::decode(&status.encode()).unwrap(), status);
        }
    }
}
