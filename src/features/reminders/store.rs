//! # Reminder Store
//!
//! Concurrent, append-only storage for reminder records. Each record sits
//! behind its own DashMap entry so mutations lock one record at a time.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::core::{ReminderError, ReminderResult};
use crate::features::reminders::model::{Reminder, ReminderId, ReminderKind, ReminderSpec};
use chrono::Utc;
use dashmap::DashMap;
use log::debug;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Record counts by kind and state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub pending: usize,
    pub fired: usize,
    pub timed: usize,
    pub event: usize,
    pub recurring: usize,
}

pub struct ReminderStore {
    records: DashMap<ReminderId, Reminder>,
    next_id: AtomicU64,
}

impl Default for ReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate a spec, allocate an id and insert the new record
    pub fn create(&self, spec: &ReminderSpec) -> ReminderResult<Reminder> {
        spec.validate()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reminder = Reminder::from_spec(id, spec, Utc::now());
        self.records.insert(id, reminder.clone());

        debug!("Stored {} reminder {}", reminder.kind, id);
        Ok(reminder)
    }

    pub fn get(&self, id: ReminderId) -> ReminderResult<Reminder> {
        self.records
            .get(&id)
            .map(|r| r.clone())
            .ok_or(ReminderError::NotFound(id))
    }

    /// Snapshot of every record in creation order
    pub fn list(&self) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self.records.iter().map(|r| r.clone()).collect();
        // Ids are allocated monotonically, so id order is creation order
        reminders.sort_unstable_by_key(|r| r.id);
        reminders
    }

    /// Apply `mutation` while holding exclusive access to one record
    pub fn update<F, R>(&self, id: ReminderId, mutation: F) -> ReminderResult<R>
    where
        F: FnOnce(&mut Reminder) -> R,
    {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(ReminderError::NotFound(id))?;
        Ok(mutation(entry.value_mut()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();

        for record in self.records.iter() {
            stats.total += 1;
            if record.fired {
                stats.fired += 1;
            } else {
                stats.pending += 1;
            }
            match record.kind {
                ReminderKind::Timed => stats.timed += 1,
                ReminderKind::Event => stats.event += 1,
                ReminderKind::Recurring => stats.recurring += 1,
            }
        }

        stats
    }
}
