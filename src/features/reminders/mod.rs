//! # Reminders Feature
//!
//! In-memory reminder engine: timed, event-triggered and recurring reminders
//! with a single firing path.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Split into store, timer, dispatcher, recurrence and coordinator
//! - 1.0.0: Initial scheduled reminders

pub mod coordinator;
pub mod dispatcher;
pub mod model;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod timer;

pub use coordinator::{FireOutcome, FiringCoordinator};
pub use dispatcher::EventDispatcher;
pub use model::{Reminder, ReminderId, ReminderKind, ReminderSpec};
pub use recurrence::{RecurrenceController, RecurrenceState, RecurrenceStep};
pub use scheduler::{ReminderScheduler, ReminderStatus, SchedulerStats};
pub use store::{ReminderStore, StoreStats};
pub use timer::TimerService;
