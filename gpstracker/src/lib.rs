//! GPS Tracker - debounced GPS lock tracking
//!
//! This library turns the noisy, asynchronous event stream of a GPS receiver
//! (satellite counts, location fixes, provider enable/disable) into a small
//! set of stable states, and exposes start/stop control over position
//! logging.
//!
//! # Architecture
//!
//! ```text
//! GpsReceiver ──► SensorSink ──┐
//! DebounceTimer expiries ──────┼──► CommandDispatcher ──► TrackingStateMachine
//! ServiceHandle / TrackerClient┘         (one task)              │
//!                                                                ▼
//!                         TrackerClient ◄── StatusBroadcaster (STATUS / LOCATION)
//! ```
//!
//! Every producer only enqueues onto the dispatcher; the state machine is
//! driven from that single task and never shared.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod sensor;
pub mod service;
pub mod timer;
pub mod tracking;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
