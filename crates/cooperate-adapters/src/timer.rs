//! Timer service backed by tokio tasks.
//!
//! Each timer is a spawned task sleeping for its interval; removing a timer
//! aborts the task. Intervals are clamped to `[MIN_INTERVAL, MAX_INTERVAL]`
//! and at most [`MAX_TIMER_COUNT`] timers may be live at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::{TimerCallback, TimerError, TimerId, TimerService};

pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
pub const MAX_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_TIMER_COUNT: usize = 64;

#[derive(Default)]
struct TimerTable {
    next_id: u64,
    live: HashMap<TimerId, AbortHandle>,
    shut_down: bool,
}

/// [`TimerService`] running timers on a tokio runtime.
///
/// Callbacks run on runtime worker threads.
#[derive(Clone)]
pub struct TokioTimerManager {
    handle: Handle,
    table: Arc<Mutex<TimerTable>>,
}

impl TokioTimerManager {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            table: Arc::new(Mutex::new(TimerTable::default())),
        }
    }

    /// Use the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of timers that have not yet finished.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.table.lock().live.len()
    }

    /// Cancel every live timer and refuse new ones.
    pub fn shutdown(&self) {
        let mut table = self.table.lock();
        table.shut_down = true;
        for (_, task) in table.live.drain() {
            task.abort();
        }
    }
}

fn clamp_interval(delay: Duration) -> Duration {
    delay.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

impl TimerService for TokioTimerManager {
    fn add_timer(
        &self,
        delay: Duration,
        repeat: u32,
        mut callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        let interval = clamp_interval(delay);
        let mut table = self.table.lock();
        if table.shut_down {
            return Err(TimerError::Shutdown);
        }
        if table.live.len() >= MAX_TIMER_COUNT {
            tracing::warn!(live = table.live.len(), "timer table exhausted");
            return Err(TimerError::Exhausted(MAX_TIMER_COUNT));
        }
        table.next_id += 1;
        let id = TimerId(table.next_id);

        // The task cannot observe the table before this function releases
        // the lock, so its abort handle is always registered first.
        let shared = Arc::clone(&self.table);
        let task = self.handle.spawn(async move {
            let mut fired = 0u32;
            loop {
                tokio::time::sleep(interval).await;
                fired = fired.saturating_add(1);
                let last = repeat != 0 && fired >= repeat;
                if last {
                    shared.lock().live.remove(&id);
                }
                callback();
                if last {
                    break;
                }
            }
        });
        table.live.insert(id, task.abort_handle());
        tracing::trace!(timer = %id, interval_ms = interval.as_millis(), repeat, "timer added");
        Ok(id)
    }

    fn remove_timer(&self, id: TimerId) -> Result<(), TimerError> {
        let task = self
            .table
            .lock()
            .live
            .remove(&id)
            .ok_or(TimerError::NotFound(id))?;
        task.abort();
        tracing::trace!(timer = %id, "timer removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn single_shot_fires_once_and_is_forgotten() {
        let timers = TokioTimerManager::current();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        timers
            .add_timer(
                Duration::from_millis(100),
                1,
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(timers.live_count(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timers.live_count(), 0);
    }

    #[tokio::test]
    async fn removed_timer_never_fires() {
        let timers = TokioTimerManager::current();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let id = timers
            .add_timer(
                Duration::from_millis(100),
                1,
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        timers.remove_timer(id).unwrap();
        assert_eq!(timers.remove_timer(id), Err(TimerError::NotFound(id)));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeating_timer_fires_requested_times() {
        let timers = TokioTimerManager::current();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        timers
            .add_timer(
                Duration::from_millis(50),
                3,
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(timers.live_count(), 0);
    }

    #[test]
    fn short_delays_keep_their_length() {
        assert_eq!(clamp_interval(Duration::from_millis(10)), Duration::from_millis(10));
        assert_eq!(clamp_interval(Duration::ZERO), MIN_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_secs(60)), MAX_INTERVAL);
    }

    #[tokio::test]
    async fn table_is_bounded() {
        let timers = TokioTimerManager::current();
        for _ in 0..MAX_TIMER_COUNT {
            timers
                .add_timer(Duration::from_secs(1), 1, Box::new(|| {}))
                .unwrap();
        }
        assert_eq!(
            timers.add_timer(Duration::from_secs(1), 1, Box::new(|| {})),
            Err(TimerError::Exhausted(MAX_TIMER_COUNT))
        );
        timers.shutdown();
        assert_eq!(timers.live_count(), 0);
        assert_eq!(
            timers.add_timer(Duration::from_secs(1), 1, Box::new(|| {})),
            Err(TimerError::Shutdown)
        );
    }
}
