//! Single-expiry debounce timer.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use super::scheduler::{TimerError, TimerScheduler};

/// Callback invoked on the scheduler when a timer expires.
///
/// Runs while the timer's slot is locked, so it must not call back into the
/// same timer. Its only job is to enqueue a message for the dispatcher.
type ExpiryCallback = Arc<dyn Fn(TimerExpiry) + Send + Sync>;

/// Identifies one arm of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerExpiry {
    /// Generation the timer had when this expiry was armed.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TimerSlot {
    generation: u64,
    armed: bool,
    token: Option<CancellationToken>,
}

impl TimerSlot {
    fn is_pending(&self) -> bool {
        self.armed
            && self
                .token
                .as_ref()
                .is_some_and(|token| !token.is_cancelled())
    }

    fn disarm(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.armed = false;
    }
}

/// A cancelable, restartable delay with at most one pending expiry.
///
/// States are `Idle` and `Armed`. Arming an armed timer cancels the pending
/// expiry first; both steps happen under the slot lock, which the expiry task
/// also takes before invoking the callback, so a cancelled expiry can never
/// run its callback afterwards.
pub struct DebounceTimer {
    name: &'static str,
    scheduler: TimerScheduler,
    slot: Arc<Mutex<TimerSlot>>,
}

impl std::fmt::Debug for DebounceTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("DebounceTimer")
            .field("name", &self.name)
            .field("armed", &slot.is_pending())
            .field("generation", &slot.generation)
            .finish()
    }
}

impl DebounceTimer {
    /// Create an idle timer on the given scheduler.
    pub fn new(name: &'static str, scheduler: TimerScheduler) -> Self {
        Self {
            name,
            scheduler,
            slot: Arc::new(Mutex::new(TimerSlot::default())),
        }
    }

    /// Timer name used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arm a single-shot expiry after `delay`, replacing any pending one.
    ///
    /// `on_expire` runs exactly once unless the timer is cancelled or
    /// re-armed first.
    pub fn arm<F>(&self, delay: Duration, on_expire: F) -> Result<TimerExpiry, TimerError>
    where
        F: Fn(TimerExpiry) + Send + Sync + 'static,
    {
        self.schedule(delay, None, Arc::new(on_expire))
    }

    /// Arm a periodic expiry: first after `initial_delay`, then every
    /// `period` until cancelled.
    pub fn arm_periodic<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        on_expire: F,
    ) -> Result<TimerExpiry, TimerError>
    where
        F: Fn(TimerExpiry) + Send + Sync + 'static,
    {
        if period.is_zero() {
            return Err(TimerError::ZeroPeriod);
        }
        self.schedule(initial_delay, Some(period), Arc::new(on_expire))
    }

    /// Cancel any pending expiry. Safe to call on an idle timer.
    ///
    /// Also invalidates expiries that already fired but have not been
    /// consumed yet (see [`is_current`](Self::is_current)).
    pub fn cancel(&self) {
        let mut slot = self.slot.lock();
        if slot.is_pending() {
            debug!(timer = self.name, generation = slot.generation, "Timer cancelled");
        }
        slot.disarm();
        slot.generation += 1;
    }

    /// Whether an expiry is pending.
    ///
    /// A timer whose scheduler was stopped reads as idle.
    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_pending()
    }

    /// Whether `expiry` belongs to the latest arm of this timer, i.e. the
    /// timer has been neither cancelled nor re-armed since.
    pub fn is_current(&self, expiry: TimerExpiry) -> bool {
        self.slot.lock().generation == expiry.generation
    }

    fn schedule(
        &self,
        delay: Duration,
        period: Option<Duration>,
        callback: ExpiryCallback,
    ) -> Result<TimerExpiry, TimerError> {
        let mut slot = self.slot.lock();
        slot.disarm();
        slot.generation += 1;

        let token = self.scheduler.issue_token()?;
        let expiry = TimerExpiry {
            generation: slot.generation,
        };
        slot.token = Some(token.clone());
        slot.armed = true;
        drop(slot);

        trace!(
            timer = self.name,
            generation = expiry.generation,
            delay_ms = delay.as_millis() as u64,
            periodic = period.is_some(),
            "Timer armed"
        );

        let slot = Arc::clone(&self.slot);
        let name = self.name;
        self.scheduler.spawn(async move {
            match period {
                None => {
                    tokio::select! {
                        biased;

                        _ = token.cancelled() => {}

                        _ = tokio::time::sleep(delay) => {
                            fire(&slot, expiry, true, &callback, name);
                        }
                    }
                }
                Some(period) => {
                    let mut ticker = tokio::time::interval_at(Instant::now() + delay, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            biased;

                            _ = token.cancelled() => break,

                            _ = ticker.tick() => {
                                if !fire(&slot, expiry, false, &callback, name) {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(expiry)
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.slot.lock().disarm();
    }
}

/// Run the callback for `expiry` if it is still the armed generation.
///
/// Returns `false` when the expiry is stale or the callback panicked; the
/// caller stops ticking in that case.
fn fire(
    slot: &Mutex<TimerSlot>,
    expiry: TimerExpiry,
    one_shot: bool,
    callback: &ExpiryCallback,
    name: &'static str,
) -> bool {
    let mut slot = slot.lock();
    if !slot.armed || slot.generation != expiry.generation {
        trace!(timer = name, generation = expiry.generation, "Stale expiry dropped");
        return false;
    }
    if one_shot {
        slot.armed = false;
        slot.token = None;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(expiry)));
    if outcome.is_err() {
        error!(
            timer = name,
            generation = expiry.generation,
            "Timer expiry callback panicked, timer returned to idle"
        );
        slot.disarm();
        return false;
    }

    debug!(timer = name, generation = expiry.generation, "Timer expired");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(count: &Arc<AtomicUsize>) -> impl Fn(TimerExpiry) + Send + Sync + 'static {
        let count = Arc::clone(count);
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_timer(name: &'static str) -> (DebounceTimer, TimerScheduler) {
        let scheduler = TimerScheduler::current().unwrap();
        (DebounceTimer::new(name, scheduler.clone()), scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_shot_fires_once() {
        let (timer, _) = test_timer("single");
        let fired = counter();

        timer.arm(Duration::from_millis(100), bump(&fired)).unwrap();
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed(), "single-shot returns to idle after expiry");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_expiry() {
        let (timer, _) = test_timer("rearm");
        let first = counter();
        let second = counter();
        let fired_at = Arc::new(Mutex::new(None));

        timer.arm(Duration::from_millis(100), bump(&first)).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let rearmed_at = Instant::now();
        let fired_at_clone = Arc::clone(&fired_at);
        let second_clone = Arc::clone(&second);
        timer
            .arm(Duration::from_millis(100), move |_| {
                second_clone.fetch_add(1, Ordering::SeqCst);
                *fired_at_clone.lock() = Some(Instant::now());
            })
            .unwrap();

        // Past the first deadline: nothing fired.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        let fired = *fired_at.lock();
        let elapsed = fired.unwrap() - rearmed_at;
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(105));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_expiry() {
        let (timer, _) = test_timer("cancel");
        let fired = counter();

        timer.arm(Duration::from_millis(50), bump(&fired)).unwrap();
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_idle_timer_is_noop() {
        let (timer, _) = test_timer("idle");
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_fires_until_cancelled() {
        let (timer, _) = test_timer("periodic");
        let fired = counter();

        timer
            .arm_periodic(
                Duration::from_millis(100),
                Duration::from_millis(50),
                bump(&fired),
            )
            .unwrap();

        // Ticks at 100, 150, 200.
        tokio::time::sleep(Duration::from_millis(210)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(timer.is_armed(), "periodic timer stays armed");

        timer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_periodic_rejects_zero_period() {
        let (timer, _) = test_timer("zero");
        let fired = counter();
        let result = timer.arm_periodic(Duration::from_millis(10), Duration::ZERO, bump(&fired));
        assert_eq!(result.unwrap_err(), TimerError::ZeroPeriod);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_goes_stale_after_cancel_or_rearm() {
        let (timer, _) = test_timer("stale");
        let fired = counter();

        let first = timer.arm(Duration::from_millis(10), bump(&fired)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(timer.is_current(first), "fired expiry is current until cancelled");

        timer.cancel();
        assert!(!timer.is_current(first));

        let second = timer.arm(Duration::from_millis(10), bump(&fired)).unwrap();
        let third = timer.arm(Duration::from_millis(10), bump(&fired)).unwrap();
        assert!(!timer.is_current(second));
        assert!(timer.is_current(third));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_cancels_and_refuses_arm() {
        let (timer, scheduler) = test_timer("stop-all");
        let fired = counter();

        timer.arm(Duration::from_millis(50), bump(&fired)).unwrap();
        scheduler.stop_all();
        assert!(!timer.is_armed(), "stopped scheduler leaves nothing pending");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());

        let result = timer.arm(Duration::from_millis(50), bump(&fired));
        assert_eq!(result.unwrap_err(), TimerError::SchedulerStopped);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_returns_timer_to_idle() {
        let (timer, _) = test_timer("panic");
        let fired = counter();

        timer
            .arm_periodic(Duration::from_millis(10), Duration::from_millis(10), |_| {
                panic!("callback failure")
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!timer.is_armed());

        // The scheduling facility survives and can run further timers.
        timer.arm(Duration::from_millis(10), bump(&fired)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_expiry() {
        let (timer, _) = test_timer("drop");
        let fired = counter();

        timer.arm(Duration::from_millis(50), bump(&fired)).unwrap();
        drop(timer);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
