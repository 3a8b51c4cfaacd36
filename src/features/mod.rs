//! # Features
//!
//! Feature modules of the reminder service.

pub mod reminders;

pub use reminders::{
    FireOutcome, Reminder, ReminderId, ReminderKind, ReminderScheduler, ReminderSpec,
    ReminderStatus, SchedulerStats,
};
