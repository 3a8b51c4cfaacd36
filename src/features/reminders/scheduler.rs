//! # Reminder Scheduler
//!
//! Owns the reminder engine: store, timers, event index and firing
//! coordinator. Cheap to clone; every clone drives the same engine.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: In-memory engine with timed, event and recurring reminders
//! - 1.0.0: Initial polling scheduler

use crate::core::ReminderResult;
use crate::features::reminders::coordinator::FiringCoordinator;
use crate::features::reminders::dispatcher::EventDispatcher;
use crate::features::reminders::model::{Reminder, ReminderId, ReminderKind, ReminderSpec};
use crate::features::reminders::store::ReminderStore;
use crate::features::reminders::timer::TimerService;
use log::info;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Compact status view of one reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderStatus {
    pub id: ReminderId,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    pub completed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

impl From<&Reminder> for ReminderStatus {
    fn from(reminder: &Reminder) -> Self {
        ReminderStatus {
            id: reminder.id,
            kind: reminder.kind,
            completed: reminder.fired,
            message: reminder.message.clone(),
            remaining: reminder.remaining,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub reminders: usize,
    pub pending: usize,
    pub fired: usize,
    pub timed: usize,
    pub event: usize,
    pub recurring: usize,
    pub pending_timers: usize,
    pub uptime_seconds: u64,
}

#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<ReminderStore>,
    timers: TimerService,
    coordinator: Arc<FiringCoordinator>,
    dispatcher: Arc<EventDispatcher>,
    start_time: Instant,
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderScheduler {
    pub fn new() -> Self {
        let store = Arc::new(ReminderStore::new());
        let timers = TimerService::new();
        let coordinator = FiringCoordinator::new(Arc::clone(&store), timers.clone());
        let dispatcher = Arc::new(EventDispatcher::new(Arc::clone(&coordinator)));

        ReminderScheduler {
            store,
            timers,
            coordinator,
            dispatcher,
            start_time: Instant::now(),
        }
    }

    /// Create a reminder and arm or subscribe it.
    ///
    /// Timed and recurring reminders fail with `NoRuntime` outside a tokio
    /// runtime, before anything is stored.
    pub fn create(&self, spec: ReminderSpec) -> ReminderResult<Reminder> {
        if !matches!(spec, ReminderSpec::Event { .. }) {
            self.timers.runtime()?;
        }
        let reminder = self.store.create(&spec)?;

        match &spec {
            ReminderSpec::Event { event_name, .. } => {
                self.dispatcher.subscribe(reminder.id, event_name);
            }
            ReminderSpec::Timed { .. } | ReminderSpec::Recurring { .. } => {
                if let Some(delay) = spec.first_delay()? {
                    self.coordinator.schedule(reminder.id, delay)?;
                }
            }
        }

        info!(
            "Created {} reminder {}: {}",
            reminder.kind, reminder.id, reminder.message
        );
        Ok(reminder)
    }

    pub fn create_timed(&self, message: &str, seconds: f64) -> ReminderResult<Reminder> {
        self.create(ReminderSpec::Timed {
            message: message.to_string(),
            seconds,
        })
    }

    pub fn create_event(&self, message: &str, event_name: &str) -> ReminderResult<Reminder> {
        self.create(ReminderSpec::Event {
            message: message.to_string(),
            event_name: event_name.to_string(),
        })
    }

    pub fn create_recurring(
        &self,
        message: &str,
        duration_seconds: f64,
        recurrences: u32,
        interval: Option<&str>,
    ) -> ReminderResult<Reminder> {
        self.create(ReminderSpec::Recurring {
            message: message.to_string(),
            duration_seconds,
            recurrences,
            interval: interval.map(String::from),
        })
    }

    /// Fire every event reminder waiting on `event_name`
    pub fn trigger_event(&self, event_name: &str) -> usize {
        self.dispatcher.trigger(event_name)
    }

    pub fn get(&self, id: ReminderId) -> ReminderResult<Reminder> {
        self.store.get(id)
    }

    /// Every reminder ever created, in creation order
    pub fn list(&self) -> Vec<Reminder> {
        self.store.list()
    }

    pub fn status(&self, id: ReminderId) -> ReminderResult<ReminderStatus> {
        self.store.get(id).map(|r| ReminderStatus::from(&r))
    }

    pub fn stats(&self) -> SchedulerStats {
        let store = self.store.stats();
        SchedulerStats {
            reminders: store.total,
            pending: store.pending,
            fired: store.fired,
            timed: store.timed,
            event: store.event,
            recurring: store.recurring,
            pending_timers: self.timers.pending(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Cancel all pending timers. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        let dropped = self.timers.cancel_all();
        info!("Reminder scheduler stopped, {dropped} pending timer(s) dropped");
        dropped
    }
}
