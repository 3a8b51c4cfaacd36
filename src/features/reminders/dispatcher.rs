//! # Event Dispatcher
//!
//! Index from event name to the event reminders waiting on it. A trigger
//! takes the whole bucket out of the index in one step, so overlapping
//! triggers of the same name never see the same reminder twice.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::features::reminders::coordinator::{FireOutcome, FiringCoordinator};
use crate::features::reminders::model::ReminderId;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::Arc;

pub struct EventDispatcher {
    index: DashMap<String, Vec<ReminderId>>,
    coordinator: Arc<FiringCoordinator>,
}

impl EventDispatcher {
    pub fn new(coordinator: Arc<FiringCoordinator>) -> Self {
        Self {
            index: DashMap::new(),
            coordinator,
        }
    }

    /// Register an event reminder under `event_name`
    pub fn subscribe(&self, id: ReminderId, event_name: &str) {
        self.index.entry(event_name.to_string()).or_default().push(id);
        debug!("Reminder {id} subscribed to event '{event_name}'");
    }

    /// Fire every reminder waiting on `event_name`, returning how many fired
    pub fn trigger(&self, event_name: &str) -> usize {
        let Some((_, subscribed)) = self.index.remove(event_name) else {
            info!("🎉 Event '{event_name}' triggered, no reminders waiting");
            return 0;
        };

        let mut triggered = 0;
        for id in subscribed {
            match self.coordinator.fire(id) {
                FireOutcome::Fired => triggered += 1,
                FireOutcome::AlreadyFired => {
                    debug!("Reminder {id} on '{event_name}' had already fired")
                }
                other => warn!("Unexpected outcome {other:?} firing reminder {id} on '{event_name}'"),
            }
        }

        info!("🎉 Event '{event_name}' triggered {triggered} reminder(s)");
        triggered
    }

    /// Number of reminders currently waiting on `event_name`
    pub fn subscribers(&self, event_name: &str) -> usize {
        self.index.get(event_name).map(|ids| ids.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::model::ReminderSpec;
    use crate::features::reminders::store::ReminderStore;
    use crate::features::reminders::timer::TimerService;

    fn setup() -> (Arc<ReminderStore>, Arc<FiringCoordinator>, EventDispatcher) {
        let store = Arc::new(ReminderStore::new());
        let coordinator = FiringCoordinator::new(Arc::clone(&store), TimerService::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&coordinator));
        (store, coordinator, dispatcher)
    }

    fn subscribe(
        store: &ReminderStore,
        dispatcher: &EventDispatcher,
        message: &str,
        event_name: &str,
    ) -> ReminderId {
        let reminder = store
            .create(&ReminderSpec::Event {
                message: message.to_string(),
                event_name: event_name.to_string(),
            })
            .unwrap();
        dispatcher.subscribe(reminder.id, event_name);
        reminder.id
    }

    #[tokio::test]
    async fn test_trigger_fires_all_subscribers_once() {
        let (store, _coordinator, dispatcher) = setup();
        let a = subscribe(&store, &dispatcher, "a", "deploy");
        let b = subscribe(&store, &dispatcher, "b", "deploy");
        let other = subscribe(&store, &dispatcher, "c", "rollback");

        assert_eq!(dispatcher.subscribers("deploy"), 2);
        assert_eq!(dispatcher.trigger("deploy"), 2);
        assert!(store.get(a).unwrap().fired);
        assert!(store.get(b).unwrap().fired);
        assert!(!store.get(other).unwrap().fired);

        assert_eq!(dispatcher.subscribers("deploy"), 0);
        assert_eq!(dispatcher.trigger("deploy"), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_changes_nothing() {
        let (store, _coordinator, dispatcher) = setup();
        let id = subscribe(&store, &dispatcher, "a", "deploy");
        let before = store.list();

        assert_eq!(dispatcher.trigger("unknown_event"), 0);
        assert_eq!(store.list(), before);
        assert!(!store.get(id).unwrap().fired);
    }

    #[tokio::test]
    async fn test_late_subscribers_are_not_retroactive() {
        let (store, _coordinator, dispatcher) = setup();
        subscribe(&store, &dispatcher, "early", "e1");
        assert_eq!(dispatcher.trigger("e1"), 1);

        let late = subscribe(&store, &dispatcher, "late", "e1");
        assert!(!store.get(late).unwrap().fired);

        assert_eq!(dispatcher.trigger("e1"), 1);
        assert!(store.get(late).unwrap().fired);
    }

    #[tokio::test]
    async fn test_already_fired_is_not_counted() {
        let (store, coordinator, dispatcher) = setup();
        let id = subscribe(&store, &dispatcher, "a", "e1");
        subscribe(&store, &dispatcher, "b", "e1");

        // A racing path fired one of them first
        assert_eq!(coordinator.fire(id), FireOutcome::Fired);

        assert_eq!(dispatcher.trigger("e1"), 1);
        assert_eq!(store.get(id).unwrap().fire_count, 1);
    }

    #[test]
    fn test_overlapping_triggers_count_each_reminder_once() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .unwrap();

        runtime.block_on(async {
            let (store, _coordinator, dispatcher) = setup();
            for i in 0..100 {
                subscribe(&store, &dispatcher, &format!("m{i}"), "flood");
            }
            let dispatcher = Arc::new(dispatcher);

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move { dispatcher.trigger("flood") })
                })
                .collect();

            let mut total = 0;
            for handle in handles {
                total += handle.await.unwrap();
            }

            assert_eq!(total, 100);
            assert!(store.list().iter().all(|r| r.fired && r.fire_count == 1));
        });
    }
}
