use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Debounce window before the loading indicator becomes visible.
pub const DEFAULT_LOADING_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Default)]
struct Counter {
    in_flight: usize,
    generation: u64,
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

struct LoadingState {
    debounce: Duration,
    counter: Mutex<Counter>,
    visible: watch::Sender<bool>,
}

impl LoadingState {
    fn counter(&self) -> MutexGuard<'_, Counter> {
        self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared in-flight request counter with a debounced visibility signal.
///
/// The indicator turns visible only when requests stay in flight longer than
/// the debounce window, and hides as soon as the last request finishes.
#[derive(Clone)]
pub struct LoadingTracker {
    state: Arc<LoadingState>,
}

impl LoadingTracker {
    /// Creates a tracker with the given debounce window.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: Arc::new(LoadingState {
                debounce,
                counter: Mutex::new(Counter::default()),
                visible: watch::Sender::new(false),
            }),
        }
    }

    /// Counts one request until the returned guard is dropped.
    #[must_use]
    pub fn track(&self) -> LoadingGuard {
        let epoch = self.show();
        LoadingGuard {
            tracker: self.clone(),
            epoch,
        }
    }

    /// Returns the number of requests in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.counter().in_flight
    }

    /// Returns whether the indicator is visible.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        *self.state.visible.borrow()
    }

    /// Subscribes to visibility changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.visible.subscribe()
    }

    /// Resets the counter and hides the indicator immediately.
    ///
    /// Guards handed out before the reset no longer count.
    pub fn force_hide(&self) {
        let mut counter = self.state.counter();
        counter.in_flight = 0;
        counter.epoch = counter.epoch.wrapping_add(1);
        Self::disarm(&mut counter);
        self.state.visible.send_if_modified(|visible| std::mem::replace(visible, false));
    }

    fn show(&self) -> u64 {
        let mut counter = self.state.counter();
        counter.in_flight += 1;
        if counter.in_flight > 1 {
            return counter.epoch;
        }

        Self::disarm(&mut counter);
        if self.state.debounce.is_zero() {
            self.state.visible.send_if_modified(|visible| !std::mem::replace(visible, true));
            return counter.epoch;
        }

        let generation = counter.generation;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let state = Arc::downgrade(&self.state);
                let debounce = self.state.debounce;
                counter.timer = Some(runtime.spawn(reveal_after(state, debounce, generation)));
            }
            Err(_) => {
                self.state.visible.send_if_modified(|visible| !std::mem::replace(visible, true));
            }
        }

        counter.epoch
    }

    fn hide(&self, epoch: u64) {
        let mut counter = self.state.counter();
        if counter.epoch != epoch {
            return;
        }
        counter.in_flight = counter.in_flight.saturating_sub(1);
        if counter.in_flight > 0 {
            return;
        }

        Self::disarm(&mut counter);
        self.state.visible.send_if_modified(|visible| std::mem::replace(visible, false));
    }

    fn disarm(counter: &mut Counter) {
        counter.generation = counter.generation.wrapping_add(1);
        if let Some(timer) = counter.timer.take() {
            timer.abort();
        }
    }
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOADING_DEBOUNCE)
    }
}

async fn reveal_after(state: Weak<LoadingState>, debounce: Duration, generation: u64) {
    tokio::time::sleep(debounce).await;

    let Some(state) = state.upgrade() else {
        return;
    };
    let counter = state.counter();
    if counter.generation == generation && counter.in_flight > 0 {
        state.visible.send_if_modified(|visible| !std::mem::replace(visible, true));
    }
}

/// Decrements the in-flight counter when dropped, on every exit path.
pub struct LoadingGuard {
    tracker: LoadingTracker,
    epoch: u64,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.tracker.hide(self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::LoadingTracker;

    #[tokio::test(start_paused = true)]
    async fn fast_requests_never_show_the_indicator() {
        let tracker = LoadingTracker::new(Duration::from_millis(200));

        let guard = tracker.track();
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(guard);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!tracker.is_visible());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_requests_keep_indicator_until_last_finishes() {
        let tracker = LoadingTracker::new(Duration::from_millis(200));

        let first = tracker.track();
        let second = tracker.track();
        let third = tracker.track();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(tracker.is_visible());

        drop(second);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(tracker.is_visible());

        drop(first);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(tracker.is_visible());
        assert_eq!(tracker.in_flight(), 1);

        drop(third);
        assert!(!tracker.is_visible());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_reveal_a_new_burst_early() {
        let tracker = LoadingTracker::new(Duration::from_millis(200));

        drop(tracker.track());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let guard = tracker.track();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!tracker.is_visible());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(tracker.is_visible());
        drop(guard);
    }

    #[tokio::test(start_paused = true)]
    async fn force_hide_resets_counter() {
        let tracker = LoadingTracker::new(Duration::from_millis(200));
        let guard = tracker.track();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(tracker.is_visible());

        tracker.force_hide();
        assert!(!tracker.is_visible());
        assert_eq!(tracker.in_flight(), 0);

        drop(guard);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn guards_from_before_force_hide_do_not_hide_later_requests() {
        let tracker = LoadingTracker::new(Duration::from_millis(200));
        let stale = tracker.track();
        tracker.force_hide();

        let current = tracker.track();
        drop(stale);
        assert_eq!(tracker.in_flight(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(tracker.is_visible());

        drop(current);
        assert!(!tracker.is_visible());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn zero_debounce_shows_immediately() {
        let tracker = LoadingTracker::new(Duration::ZERO);
        let guard = tracker.track();
        assert!(tracker.is_visible());
        drop(guard);
        assert!(!tracker.is_visible());
    }
}
