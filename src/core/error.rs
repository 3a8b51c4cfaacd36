//! # Reminder Errors
//!
//! Typed errors surfaced by the reminder engine. User-facing variants are
//! recovered at the HTTP boundary and rendered as failure responses.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::features::reminders::ReminderId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReminderError {
    /// Creation parameters were missing or out of range
    #[error("{0}")]
    Validation(String),

    /// No reminder exists with the given id
    #[error("Reminder {0} not found")]
    NotFound(ReminderId),

    /// Timers were requested outside a tokio runtime
    #[error("No tokio runtime available to arm reminder timers")]
    NoRuntime,
}

impl ReminderError {
    pub fn validation(reason: impl Into<String>) -> Self {
        ReminderError::Validation(reason.into())
    }

    /// HTTP status code the facade reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ReminderError::Validation(_) => 400,
            ReminderError::NotFound(_) => 404,
            ReminderError::NoRuntime => 500,
        }
    }
}

pub type ReminderResult<T> = std::result::Result<T, ReminderError>;
