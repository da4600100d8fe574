//! The four tracking timers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::dispatcher::DispatcherHandle;
use crate::timer::{DebounceTimer, TimerExpiry, TimerScheduler};

/// Which tracking timer an expiry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Bounded wait for the first lock after logging starts.
    FirstFix,
    /// Debounce window before a lost fix is reported.
    LockLost,
    /// Extra sampling time after an accurate fix.
    ImproveAccuracy,
    /// Sensor-off interval of the power-save cycle.
    Poll,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::FirstFix,
        TimerKind::LockLost,
        TimerKind::ImproveAccuracy,
        TimerKind::Poll,
    ];

    /// Name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            TimerKind::FirstFix => "first-fix",
            TimerKind::LockLost => "lock-lost",
            TimerKind::ImproveAccuracy => "improve-accuracy",
            TimerKind::Poll => "poll",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The timers owned by one state machine.
///
/// Every expiry callback only enqueues `TimerExpired` onto the dispatcher.
#[derive(Debug)]
pub(crate) struct TrackerTimers {
    first_fix: DebounceTimer,
    lock_lost: DebounceTimer,
    improve_accuracy: DebounceTimer,
    poll: DebounceTimer,
    dispatcher: DispatcherHandle,
}

impl TrackerTimers {
    pub(crate) fn new(scheduler: TimerScheduler, dispatcher: DispatcherHandle) -> Self {
        Self {
            first_fix: DebounceTimer::new(TimerKind::FirstFix.name(), scheduler.clone()),
            lock_lost: DebounceTimer::new(TimerKind::LockLost.name(), scheduler.clone()),
            improve_accuracy: DebounceTimer::new(
                TimerKind::ImproveAccuracy.name(),
                scheduler.clone(),
            ),
            poll: DebounceTimer::new(TimerKind::Poll.name(), scheduler),
            dispatcher,
        }
    }

    fn timer(&self, kind: TimerKind) -> &DebounceTimer {
        match kind {
            TimerKind::FirstFix => &self.first_fix,
            TimerKind::LockLost => &self.lock_lost,
            TimerKind::ImproveAccuracy => &self.improve_accuracy,
            TimerKind::Poll => &self.poll,
        }
    }

    /// Arm `kind`, replacing any pending expiry.
    ///
    /// Failure (the scheduler was stopped) is logged and leaves the timer
    /// idle.
    pub(crate) fn arm(&self, kind: TimerKind, delay: Duration) {
        let dispatcher = self.dispatcher.clone();
        let result = self.timer(kind).arm(delay, move |expiry| {
            if dispatcher.timer_expired(kind, expiry).is_err() {
                trace!(timer = kind.name(), "Expiry after dispatcher closed");
            }
        });
        match result {
            Ok(expiry) => debug!(
                timer = kind.name(),
                generation = expiry.generation,
                delay_ms = delay.as_millis() as u64,
                "Tracking timer armed"
            ),
            Err(e) => error!(timer = kind.name(), error = %e, "Failed to arm tracking timer"),
        }
    }

    pub(crate) fn cancel(&self, kind: TimerKind) {
        self.timer(kind).cancel();
    }

    pub(crate) fn cancel_all(&self) {
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
    }

    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.timer(kind).is_armed()
    }

    /// Whether `expiry` is from the latest arm of `kind`.
    pub(crate) fn is_current(&self, kind: TimerKind, expiry: TimerExpiry) -> bool {
        self.timer(kind).is_current(expiry)
    }

    pub(crate) fn all_idle(&self) -> bool {
        TimerKind::ALL.into_iter().all(|kind| !self.is_armed(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchMessage;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_enqueues_tagged_message() {
        let (handle, mut rx) = DispatcherHandle::channel();
        let timers = TrackerTimers::new(TimerScheduler::current().unwrap(), handle);

        timers.arm(TimerKind::LockLost, Duration::from_secs(10));
        assert!(timers.is_armed(TimerKind::LockLost));
        assert!(!timers.all_idle());

        match rx.recv().await {
            Some(DispatchMessage::TimerExpired { timer, expiry }) => {
                assert_eq!(timer, TimerKind::LockLost);
                assert!(timers.is_current(TimerKind::LockLost, expiry));
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(timers.all_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let (handle, _rx) = DispatcherHandle::channel();
        let timers = TrackerTimers::new(TimerScheduler::current().unwrap(), handle);

        for kind in TimerKind::ALL {
            timers.arm(kind, Duration::from_secs(1));
        }
        timers.cancel_all();
        assert!(timers.all_idle());
    }

    #[tokio::test]
    async fn test_arm_after_stop_leaves_timer_idle() {
        let (handle, _rx) = DispatcherHandle::channel();
        let scheduler = TimerScheduler::current().unwrap();
        let timers = TrackerTimers::new(scheduler.clone(), handle);

        scheduler.stop_all();
        timers.arm(TimerKind::Poll, Duration::from_secs(1));
        assert!(!timers.is_armed(TimerKind::Poll));
    }
}
