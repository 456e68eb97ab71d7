//! Per-lock notification timers.
//!
//! Each lock has at most one timer of each [`TimerKind`]. Starting a timer
//! aborts the previous one of the same kind. Dropping the set aborts
//! everything, so no timer outlives its lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Repeating "door left open" reminder.
    LeftOpen,

    /// One-shot "lock state not confirmed" alert.
    LockConfirm,
}

#[derive(Debug, Default)]
pub struct TimerSet {
    timers: Mutex<HashMap<TimerKind, JoinHandle<()>>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<TimerKind, JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, kind: TimerKind, handle: JoinHandle<()>) {
        if let Some(previous) = self.timers().insert(kind, handle) {
            previous.abort();
        }
    }

    /// Run `task` once after `delay`.
    pub fn start_once<F>(&self, kind: TimerKind, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        self.replace(kind, handle);
    }

    /// Run the future built by `make` every `period`, first after one period.
    pub fn start_repeating<F, Fut>(&self, kind: TimerKind, period: Duration, make: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                make().await;
            }
        });
        self.replace(kind, handle);
    }

    /// Abort a timer. Returns `true` if one was still pending.
    pub fn cancel(&self, kind: TimerKind) -> bool {
        match self.timers().remove(&kind) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, handle) in self.timers().drain() {
            handle.abort();
        }
    }

    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.timers()
            .get(&kind)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_once() {
        let timers = TimerSet::new();
        let fired = counter();
        let f = Arc::clone(&fired);

        timers.start_once(TimerKind::LockConfirm, Duration::from_secs(30), async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timers.is_active(TimerKind::LockConfirm));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timers.is_active(TimerKind::LockConfirm));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous() {
        let timers = TimerSet::new();
        let fired = counter();

        for _ in 0..3 {
            let f = Arc::clone(&fired);
            timers.start_once(TimerKind::LockConfirm, Duration::from_secs(10), async move {
                f.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_until_cancelled() {
        let timers = TimerSet::new();
        let fired = counter();
        let f = Arc::clone(&fired);

        timers.start_repeating(TimerKind::LeftOpen, Duration::from_secs(300), move || {
            let f = Arc::clone(&f);
            async move {
                f.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(602)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);

        assert!(timers.cancel(TimerKind::LeftOpen));
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_everything() {
        let fired = counter();
        {
            let timers = TimerSet::new();
            let f = Arc::clone(&fired);
            timers.start_once(TimerKind::LockConfirm, Duration::from_secs(1), async move {
                f.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_without_timer() {
        let timers = TimerSet::new();
        assert!(!timers.cancel(TimerKind::LeftOpen));
    }
}
