//! Eviction Timer
//!
//! One pending tokio task per scheduled key.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Cap for deadlines too far out to represent; such a timer never fires in
/// practice.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Handle to a pending eviction.
#[derive(Debug)]
pub(crate) struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Timer {
    /// Spawns a task on `runtime` that runs `on_fire` after `delay`.
    pub(crate) fn spawn<F>(runtime: &Handle, delay: Duration, generation: u64, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        // Deadline is fixed now, not when the task is first polled.
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        });

        Self { generation, handle }
    }

    /// Generation of the entry this timer was armed for.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// True once the task has ended, whether it fired, was cancelled or
    /// panicked.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the timer; a no-op if it already fired.
    pub(crate) fn cancel(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = Timer::spawn(&Handle::current(), Duration::from_millis(100), 7, move || {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(timer.generation(), 7);

        tokio::time::advance(Duration::from_millis(99)).await;
        settle().await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_delay_does_not_panic() {
        let timer = Timer::spawn(&Handle::current(), Duration::MAX, 0, || {});
        tokio::time::advance(Duration::from_secs(3_600)).await;
        settle().await;
        timer.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = Timer::spawn(&Handle::current(), Duration::from_millis(100), 1, move || {
            flag.store(true, Ordering::SeqCst);
        });

        timer.cancel();
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
