//! Shared timer scheduling facility.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Errors raised by the timer facility.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The scheduler was torn down with `stop_all()`; no further arming.
    #[error("Timer scheduler has been stopped")]
    SchedulerStopped,

    /// A periodic timer was armed with a zero period.
    #[error("Periodic timer requires a non-zero period")]
    ZeroPeriod,

    /// No tokio runtime was available to host the scheduler.
    #[error("No tokio runtime available for the timer scheduler")]
    NoRuntime,
}

#[derive(Debug)]
struct SchedulerInner {
    handle: Handle,
    root: CancellationToken,
    stopped: AtomicBool,
}

/// The scheduling facility shared by every timer of a service instance.
///
/// Cheap to clone; all clones refer to the same facility. Constructed once
/// per service and torn down once with [`stop_all`](Self::stop_all), so two
/// service instances (e.g. in tests) never interfere.
#[derive(Debug, Clone)]
pub struct TimerScheduler {
    inner: Arc<SchedulerInner>,
}

impl TimerScheduler {
    /// Create a scheduler that runs expiry tasks on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                handle,
                root: CancellationToken::new(),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    pub fn current() -> Result<Self, TimerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| TimerError::NoRuntime)
    }

    /// Cancel every outstanding timer and release the facility.
    ///
    /// Idempotent. After this call every `arm` fails with
    /// [`TimerError::SchedulerStopped`].
    pub fn stop_all(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("Timer scheduler already stopped");
            return;
        }
        self.inner.root.cancel();
        info!("Timer scheduler stopped, all pending expiries cancelled");
    }

    /// Whether [`stop_all`](Self::stop_all) has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Issue a cancellation token for one arm of a timer.
    ///
    /// The token is a child of the root token, so `stop_all` cancels it too.
    pub(crate) fn issue_token(&self) -> Result<CancellationToken, TimerError> {
        if self.is_stopped() {
            return Err(TimerError::SchedulerStopped);
        }
        Ok(self.inner.root.child_token())
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.handle.spawn(task);
    }
}
