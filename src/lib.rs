// Core layer - configuration and error types
pub mod core;

// Features layer - the reminder engine
pub mod features;

// HTTP layer - API facade over the engine
pub mod http;

// Re-export core items
pub use core::{Config, ReminderError, ReminderResult};

// Re-export feature items
pub use features::{
    FireOutcome, Reminder, ReminderId, ReminderKind, ReminderScheduler, ReminderSpec,
    ReminderStatus, SchedulerStats,
};

// Re-export HTTP items
pub use http::{HttpServer, ServerHandle};
