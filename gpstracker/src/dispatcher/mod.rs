//! Serialized command dispatcher.
//!
//! Every producer (clients, receiver callbacks, timer expiries) enqueues a
//! [`DispatchMessage`] through a [`DispatcherHandle`]. A single
//! [`CommandDispatcher`] task consumes the queue in order and is the only
//! context that reads or mutates tracking state or arms timers.
//!
//! ```text
//! SensorSink ─────┐
//! DebounceTimer ──┼─► mpsc (unbounded) ─► CommandDispatcher ─► TrackingStateMachine
//! ServiceHandle ──┘
//! ```
//!
//! `StopService` is terminal: the dispatcher exits and closes the queue, and
//! further sends return [`DispatchError::Closed`].

mod command;
mod handle;
mod runner;

pub use command::{Command, DispatchMessage};
pub use handle::{DispatchError, DispatcherHandle};
pub use runner::CommandDispatcher;
