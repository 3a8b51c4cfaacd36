//! # Firing Coordinator
//!
//! The only writer of `fired`, `remaining` and the fire bookkeeping fields.
//! Every fire, whether from a timer or an event trigger, goes through
//! [`FiringCoordinator::fire`], which applies the transition under the
//! record's exclusive section and re-arms recurring reminders afterwards.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Recurrence decisions delegated to RecurrenceState
//! - 1.0.0: Idempotent fire for timed and event reminders

use crate::core::ReminderResult;
use crate::features::reminders::model::{chrono_from_secs, Reminder, ReminderId, ReminderKind};
use crate::features::reminders::recurrence::{
    RecurrenceController, RecurrenceState, RecurrenceStep,
};
use crate::features::reminders::store::ReminderStore;
use crate::features::reminders::timer::TimerService;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Result of one fire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// A timed or event reminder reached its terminal state
    Fired,
    /// A recurring reminder fired and was re-armed
    Recurred { remaining: u32 },
    /// A recurring reminder fired for the last time
    Completed,
    /// Nothing changed; the reminder had already reached its terminal state
    AlreadyFired,
    /// No reminder with that id
    NotFound,
}

impl FireOutcome {
    /// Whether this attempt applied a fire transition
    pub fn applied(&self) -> bool {
        matches!(
            self,
            FireOutcome::Fired | FireOutcome::Recurred { .. } | FireOutcome::Completed
        )
    }
}

/// What happened inside the record's section, logged after release
struct Transition {
    outcome: FireOutcome,
    kind: ReminderKind,
    message: String,
    rearm_after: Option<Duration>,
    recurrences: u32,
}

pub struct FiringCoordinator {
    store: Arc<ReminderStore>,
    timers: TimerService,
    recurrence: RecurrenceController,
}

impl FiringCoordinator {
    pub fn new(store: Arc<ReminderStore>, timers: TimerService) -> Arc<Self> {
        Arc::new(Self {
            store,
            recurrence: RecurrenceController::new(timers.clone()),
            timers,
        })
    }

    /// Arm the first timer for a timed or recurring reminder
    pub fn schedule(self: &Arc<Self>, id: ReminderId, delay: Duration) -> ReminderResult<()> {
        let coordinator = Arc::clone(self);
        self.timers.arm(id, delay, move |id| {
            coordinator.fire(id);
        })
    }

    /// Apply one fire to a reminder
    pub fn fire(self: &Arc<Self>, id: ReminderId) -> FireOutcome {
        let transition = match self
            .store
            .update(id, |reminder| Self::apply_fire(reminder, Utc::now()))
        {
            Ok(transition) => transition,
            Err(e) => {
                warn!("Fire requested but skipped: {e}");
                return FireOutcome::NotFound;
            }
        };

        match transition.outcome {
            FireOutcome::Fired => match transition.kind {
                ReminderKind::Event => {
                    info!("🎉 Event reminder {id} fired: {}", transition.message)
                }
                _ => info!("⏰ Reminder {id} fired: {}", transition.message),
            },
            FireOutcome::Recurred { remaining } => {
                info!(
                    "🔁 Recurring reminder {id}: {} ({remaining} left)",
                    transition.message
                );
                if let Some(interval) = transition.rearm_after {
                    let coordinator = Arc::clone(self);
                    let rearmed = self.recurrence.rearm(id, interval, remaining, move |id| {
                        coordinator.fire(id);
                    });
                    if let Err(e) = rearmed {
                        error!("Could not re-arm recurring reminder {id}: {e}");
                    }
                }
            }
            FireOutcome::Completed => {
                info!(
                    "✅ Completed all {} recurrences for reminder {id}: \"{}\"",
                    transition.recurrences, transition.message
                );
            }
            FireOutcome::AlreadyFired => {
                debug!("Reminder {id} already fired, ignoring duplicate fire");
            }
            FireOutcome::NotFound => {}
        }

        transition.outcome
    }

    /// State transition for one fire, run under the record's exclusive section
    fn apply_fire(reminder: &mut Reminder, now: DateTime<Utc>) -> Transition {
        let mut transition = Transition {
            outcome: FireOutcome::AlreadyFired,
            kind: reminder.kind,
            message: reminder.message.clone(),
            rearm_after: None,
            recurrences: reminder.recurrences.unwrap_or(0),
        };

        if reminder.fired {
            return transition;
        }

        match reminder.kind {
            ReminderKind::Timed | ReminderKind::Event => {
                reminder.fired = true;
                reminder.fired_at = Some(now);
                reminder.fire_count += 1;
                transition.outcome = FireOutcome::Fired;
            }
            ReminderKind::Recurring => {
                let state = RecurrenceState::from_remaining(reminder.remaining.unwrap_or(0));
                let Some((next, step)) = state.advance() else {
                    error!(
                        "Recurring reminder {} is unfired with nothing remaining",
                        reminder.id
                    );
                    debug_assert!(false, "recurring reminder unfired with remaining == 0");
                    return transition;
                };

                reminder.remaining = Some(next.remaining());
                reminder.fire_count += 1;

                match step {
                    RecurrenceStep::Rearm { remaining } => {
                        let interval = reminder.recurrence_interval();
                        reminder.next_trigger = reminder
                            .duration_seconds
                            .map(|secs| now + chrono_from_secs(secs));
                        transition.rearm_after = interval;
                        transition.outcome = FireOutcome::Recurred { remaining };
                    }
                    RecurrenceStep::Finish => {
                        reminder.fired = true;
                        reminder.fired_at = Some(now);
                        reminder.next_trigger = None;
                        transition.outcome = FireOutcome::Completed;
                    }
                }
            }
        }

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::model::ReminderSpec;

    fn setup() -> (Arc<ReminderStore>, TimerService, Arc<FiringCoordinator>) {
        let store = Arc::new(ReminderStore::new());
        let timers = TimerService::new();
        let coordinator = FiringCoordinator::new(Arc::clone(&store), timers.clone());
        (store, timers, coordinator)
    }

    #[tokio::test]
    async fn test_timed_fire_is_idempotent() {
        let (store, _timers, coordinator) = setup();
        let id = store
            .create(&ReminderSpec::Timed {
                message: "tea".to_string(),
                seconds: 60.0,
            })
            .unwrap()
            .id;

        assert_eq!(coordinator.fire(id), FireOutcome::Fired);
        let after_first = store.get(id).unwrap();
        assert!(after_first.fired);
        assert_eq!(after_first.fire_count, 1);
        assert!(after_first.fired_at.is_some());

        assert_eq!(coordinator.fire(id), FireOutcome::AlreadyFired);
        assert_eq!(store.get(id).unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (_store, _timers, coordinator) = setup();
        assert_eq!(coordinator.fire(404), FireOutcome::NotFound);
        assert!(!FireOutcome::NotFound.applied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_fire_decrements_and_rearms() {
        let (store, timers, coordinator) = setup();
        let id = store
            .create(&ReminderSpec::Recurring {
                message: "water".to_string(),
                duration_seconds: 60.0,
                recurrences: 2,
                interval: None,
            })
            .unwrap()
            .id;

        assert_eq!(coordinator.fire(id), FireOutcome::Recurred { remaining: 1 });
        let reminder = store.get(id).unwrap();
        assert_eq!(reminder.remaining, Some(1));
        assert!(!reminder.fired);
        assert!(reminder.next_trigger.is_some());
        assert!(timers.is_armed(id));

        assert_eq!(coordinator.fire(id), FireOutcome::Completed);
        let reminder = store.get(id).unwrap();
        assert_eq!(reminder.remaining, Some(0));
        assert_eq!(reminder.fire_count, 2);
        assert!(reminder.fired);
        assert!(reminder.next_trigger.is_none());

        assert_eq!(coordinator.fire(id), FireOutcome::AlreadyFired);
        assert_eq!(store.get(id).unwrap().remaining, Some(0));

        // Drop the arm still pending from the first fire
        assert!(timers.cancel(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_timed_reminder_fires() {
        let (store, _timers, coordinator) = setup();
        let id = store
            .create(&ReminderSpec::Timed {
                message: "stand up".to_string(),
                seconds: 5.0,
            })
            .unwrap()
            .id;

        coordinator.schedule(id, Duration::from_secs(5)).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!store.get(id).unwrap().fired);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(id).unwrap().fired);
    }

    #[test]
    fn test_concurrent_fires_apply_once() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (store, _timers, coordinator) = setup();
            let id = store
                .create(&ReminderSpec::Event {
                    message: "race".to_string(),
                    event_name: "go".to_string(),
                })
                .unwrap()
                .id;

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let coordinator = Arc::clone(&coordinator);
                    tokio::spawn(async move { coordinator.fire(id) })
                })
                .collect();

            let mut applied = 0;
            for handle in handles {
                if handle.await.unwrap().applied() {
                    applied += 1;
                }
            }

            assert_eq!(applied, 1);
            assert_eq!(store.get(id).unwrap().fire_count, 1);
        });
    }
}
