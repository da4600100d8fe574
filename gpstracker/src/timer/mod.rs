//! Cancelable, restartable delay timers.
//!
//! A [`TimerScheduler`] is the shared scheduling facility: it owns the tokio
//! runtime handle that expiry tasks run on and a root cancellation token that
//! [`TimerScheduler::stop_all`] trips at teardown. Each [`DebounceTimer`]
//! holds at most one pending expiry; arming it again replaces the previous
//! expiry atomically.
//!
//! # Generations
//!
//! Every `arm` and `cancel` bumps the timer's generation, and every expiry
//! carries the generation it was armed with ([`TimerExpiry`]). An expiry that
//! was already enqueued when the timer was cancelled or re-armed can be
//! recognised as stale with [`DebounceTimer::is_current`].
//!
//! # Example
//!
//! ```ignore
//! use gpstracker::timer::{DebounceTimer, TimerScheduler};
//! use std::time::Duration;
//!
//! let scheduler = TimerScheduler::current()?;
//! let timer = DebounceTimer::new("lock-lost", scheduler.clone());
//!
//! timer.arm(Duration::from_secs(10), move |expiry| {
//!     let _ = tx.send(expiry);
//! })?;
//!
//! // Later, at teardown
//! scheduler.stop_all();
//! ```

mod debounce;
mod scheduler;

pub use debounce::{DebounceTimer, TimerExpiry};
pub use scheduler::{TimerError, TimerScheduler};
