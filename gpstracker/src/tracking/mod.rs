//! Lock tracking: the status model and the state machine that maintains it.
//!
//! # States
//!
//! The status is the cross product of [`LoggingState`] and [`ProviderState`]:
//!
//! ```text
//!            fix > 0                        lock-lost expiry
//!   NoLock ───────────► Locked ── fix = 0 ──► (filter window) ──► NoLock
//!     ▲                   │                        │
//!     │ provider on       │ fix > 0 within window  │
//!     │                   ◄────────────────────────┘
//!   Disabled ◄── provider off (from any state)
//! ```
//!
//! A `Locked` receiver that reports an accurate location is kept on for a
//! short refinement window, then switched off and polled periodically.
//!
//! # Example
//!
//! ```ignore
//! use gpstracker::tracking::{LoggingState, ProviderState, StatusRecord};
//!
//! let status = StatusRecord::new(LoggingState::Logging, ProviderState::Locked, 7, 4);
//! let wire = status.encode(); // [1, 2, 7, 4]
//! assert_eq!(StatusRecord::decode(&wire)?, status);
//! ```

mod location;
mod machine;
mod status;
mod timers;

pub use location::{LocationSample, SatelliteCounts, SatelliteInfo};
pub use machine::{Flow, TrackingStateMachine};
pub use status::{
    LockIndicator, LoggingState, ProviderState, StatusRecord, WireError, STATUS_WIRE_LEN,
};
pub use timers::TimerKind;
