//! # Timer Service
//!
//! One-shot timers keyed by reminder id. Each arm runs as a detached tokio
//! task that sleeps until its deadline, claims its slot, then invokes the
//! callback. Arming an id that already has a pending timer replaces it.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Generation-checked claims so cancel and replace never race a fire
//! - 1.0.0: Initial per-reminder timers

use crate::core::{ReminderError, ReminderResult};
use crate::features::reminders::model::ReminderId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct TimerService {
    pending: Arc<DashMap<ReminderId, PendingTimer>>,
    generations: Arc<AtomicU64>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the runtime timers are spawned on
    pub fn runtime(&self) -> ReminderResult<Handle> {
        Handle::try_current().map_err(|_| ReminderError::NoRuntime)
    }

    /// Schedule `callback(id)` to run once `delay` has elapsed from now.
    ///
    /// Fails with [`ReminderError::NoRuntime`] outside a tokio runtime.
    pub fn arm<F>(&self, id: ReminderId, delay: Duration, callback: F) -> ReminderResult<()>
    where
        F: FnOnce(ReminderId) + Send + 'static,
    {
        let runtime = self.runtime()?;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;

        // Holding the entry keeps the task from claiming before it is registered
        match self.pending.entry(id) {
            Entry::Occupied(mut occupied) => {
                let handle = self.spawn_timer(&runtime, id, generation, deadline, callback);
                let previous = occupied.insert(PendingTimer { generation, handle });
                previous.handle.abort();
                debug!("Re-armed timer for reminder {id} ({delay:?}), replacing pending arm");
            }
            Entry::Vacant(vacant) => {
                let handle = self.spawn_timer(&runtime, id, generation, deadline, callback);
                vacant.insert(PendingTimer { generation, handle });
                debug!("Armed timer for reminder {id} ({delay:?})");
            }
        }
        Ok(())
    }

    fn spawn_timer<F>(
        &self,
        runtime: &Handle,
        id: ReminderId,
        generation: u64,
        deadline: Instant,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(ReminderId) + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;

            // A cancel or a newer arm removed or replaced our slot
            if pending
                .remove_if(&id, |_, timer| timer.generation == generation)
                .is_none()
            {
                return;
            }

            callback(id);
        })
    }

    /// Remove a pending arm. Returns false if none was pending, including
    /// when the timer already started firing.
    pub fn cancel(&self, id: ReminderId) -> bool {
        match self.pending.remove(&id) {
            Some((_, timer)) => {
                timer.handle.abort();
                debug!("Cancelled timer for reminder {id}");
                true
            }
            None => false,
        }
    }

    /// Cancel every pending arm, returning how many were dropped
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<ReminderId> = self.pending.iter().map(|t| *t.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn is_armed(&self, id: ReminderId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of armed timers that have not fired yet
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<ReminderId>>>, impl Fn() -> Box<dyn FnOnce(ReminderId) + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let make = move || {
            let sink = Arc::clone(&sink);
            Box::new(move |id| sink.lock().unwrap().push(id)) as Box<dyn FnOnce(ReminderId) + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_fire_early() {
        let timers = TimerService::new();
        let (fired, callback) = recorder();

        timers.arm(1, Duration::from_secs(5), callback()).unwrap();
        assert!(timers.is_armed(1));

        sleep(Duration::from_millis(4_900)).await;
        assert!(fired.lock().unwrap().is_empty());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(*fired.lock().unwrap(), vec![1]);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending() {
        let timers = TimerService::new();
        let (fired, callback) = recorder();

        timers.arm(1, Duration::from_secs(1), callback()).unwrap();
        assert!(timers.cancel(1));
        assert!(!timers.cancel(1));

        sleep(Duration::from_secs(2)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_returns_false() {
        let timers = TimerService::new();
        let (fired, callback) = recorder();

        timers.arm(3, Duration::from_millis(10), callback()).unwrap();
        sleep(Duration::from_millis(50)).await;

        assert!(!timers.cancel(3));
        assert_eq!(*fired.lock().unwrap(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending() {
        let timers = TimerService::new();
        let (fired, callback) = recorder();

        timers.arm(1, Duration::from_secs(1), callback()).unwrap();
        timers.arm(1, Duration::from_secs(3), callback()).unwrap();
        assert_eq!(timers.pending(), 1);

        sleep(Duration::from_secs(2)).await;
        assert!(fired.lock().unwrap().is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_timers() {
        let timers = TimerService::new();
        let (fired, callback) = recorder();

        timers.arm(1, Duration::from_secs(3), callback()).unwrap();
        timers.arm(2, Duration::from_secs(1), callback()).unwrap();
        timers.arm(3, Duration::from_secs(2), callback()).unwrap();

        sleep(Duration::from_secs(4)).await;
        assert_eq!(*fired.lock().unwrap(), vec![2, 3, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let timers = TimerService::new();
        let (fired, callback) = recorder();

        for id in 1..=4 {
            timers.arm(id, Duration::from_secs(10), callback()).unwrap();
        }
        assert_eq!(timers.pending(), 4);
        assert_eq!(timers.cancel_all(), 4);
        assert_eq!(timers.pending(), 0);

        sleep(Duration::from_secs(11)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_arm_without_runtime_is_an_error() {
        let timers = TimerService::new();
        assert_eq!(
            timers.arm(1, Duration::from_secs(1), |_| {}),
            Err(ReminderError::NoRuntime)
        );
        assert!(!timers.is_armed(1));
        assert_eq!(timers.pending(), 0);
    }
}
