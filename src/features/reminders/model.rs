//! # Reminder Model
//!
//! Reminder records, creation specs and their validation.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Fractional delays, fireCount and firedAt
//! - 1.0.0: Timed, event and recurring reminders

use crate::core::{ReminderError, ReminderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifier assigned by the store, starting at 1 and never reused
pub type ReminderId = u64;

/// Longest delay accepted for a timer (ten years)
pub const MAX_DELAY_SECS: f64 = 315_360_000.0;

/// Label given to recurring reminders created without one
pub const DEFAULT_INTERVAL_LABEL: &str = "custom";

/// Kind of a reminder, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    /// Fires once after a delay
    Timed,
    /// Fires once when its event name is triggered
    Event,
    /// Fires a fixed number of times, one interval apart
    Recurring,
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderKind::Timed => write!(f, "timed"),
            ReminderKind::Event => write!(f, "event"),
            ReminderKind::Recurring => write!(f, "recurring"),
        }
    }
}

/// A reminder record as stored and listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,

    #[serde(rename = "type")]
    pub kind: ReminderKind,

    pub message: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// True once the reminder reached its terminal state
    pub fired: bool,

    #[serde(rename = "firedAt", default, skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,

    /// Fire transitions applied so far
    #[serde(rename = "fireCount", default)]
    pub fire_count: u32,

    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,

    /// Requested delay of a timed reminder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,

    #[serde(rename = "fireAt", default, skip_serializing_if = "Option::is_none")]
    pub fire_at: Option<DateTime<Utc>>,

    /// Interval between recurrences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrences: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,

    #[serde(rename = "nextTrigger", default, skip_serializing_if = "Option::is_none")]
    pub next_trigger: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Build the initial record for a validated spec
    pub(crate) fn from_spec(id: ReminderId, spec: &ReminderSpec, now: DateTime<Utc>) -> Self {
        let mut reminder = Reminder {
            id,
            kind: spec.kind(),
            message: spec.message().to_string(),
            created_at: now,
            fired: false,
            fired_at: None,
            fire_count: 0,
            event_name: None,
            seconds: None,
            fire_at: None,
            duration_seconds: None,
            interval: None,
            recurrences: None,
            remaining: None,
            next_trigger: None,
        };

        match spec {
            ReminderSpec::Timed { seconds, .. } => {
                reminder.seconds = Some(*seconds);
                reminder.fire_at = Some(now + chrono_from_secs(*seconds));
            }
            ReminderSpec::Event { event_name, .. } => {
                reminder.event_name = Some(event_name.clone());
            }
            ReminderSpec::Recurring {
                duration_seconds,
                recurrences,
                interval,
                ..
            } => {
                reminder.duration_seconds = Some(*duration_seconds);
                reminder.interval = Some(
                    interval
                        .clone()
                        .unwrap_or_else(|| DEFAULT_INTERVAL_LABEL.to_string()),
                );
                reminder.recurrences = Some(*recurrences);
                reminder.remaining = Some(*recurrences);
                reminder.next_trigger = Some(now + chrono_from_secs(*duration_seconds));
            }
        }

        reminder
    }

    /// Interval between recurrences, for recurring reminders
    pub fn recurrence_interval(&self) -> Option<Duration> {
        self.duration_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Whether the reminder still waits for a fire
    pub fn is_pending(&self) -> bool {
        !self.fired
    }
}

/// Parameters for creating a reminder
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderSpec {
    Timed {
        message: String,
        seconds: f64,
    },
    Event {
        message: String,
        event_name: String,
    },
    Recurring {
        message: String,
        duration_seconds: f64,
        recurrences: u32,
        interval: Option<String>,
    },
}

impl ReminderSpec {
    pub fn kind(&self) -> ReminderKind {
        match self {
            ReminderSpec::Timed { .. } => ReminderKind::Timed,
            ReminderSpec::Event { .. } => ReminderKind::Event,
            ReminderSpec::Recurring { .. } => ReminderKind::Recurring,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ReminderSpec::Timed { message, .. }
            | ReminderSpec::Event { message, .. }
            | ReminderSpec::Recurring { message, .. } => message,
        }
    }

    /// Check every field, returning the first problem found
    pub fn validate(&self) -> ReminderResult<()> {
        if self.message().trim().is_empty() {
            return Err(ReminderError::validation("Message must not be empty."));
        }

        match self {
            ReminderSpec::Timed { seconds, .. } => {
                positive_delay(*seconds, "seconds")?;
            }
            ReminderSpec::Event { event_name, .. } => {
                if event_name.trim().is_empty() {
                    return Err(ReminderError::validation("eventName must not be empty."));
                }
            }
            ReminderSpec::Recurring {
                duration_seconds,
                recurrences,
                ..
            } => {
                positive_delay(*duration_seconds, "duration_seconds")?;
                if *recurrences == 0 {
                    return Err(ReminderError::validation(
                        "recurrences must be at least 1.",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Delay before the first fire, or None for event reminders
    pub fn first_delay(&self) -> ReminderResult<Option<Duration>> {
        match self {
            ReminderSpec::Timed { seconds, .. } => positive_delay(*seconds, "seconds").map(Some),
            ReminderSpec::Recurring {
                duration_seconds, ..
            } => positive_delay(*duration_seconds, "duration_seconds").map(Some),
            ReminderSpec::Event { .. } => Ok(None),
        }
    }
}

/// Convert a requested delay in seconds into a timer duration
pub fn positive_delay(secs: f64, field: &str) -> ReminderResult<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ReminderError::validation(format!(
            "{field} must be a positive number."
        )));
    }
    if secs > MAX_DELAY_SECS {
        return Err(ReminderError::validation(format!(
            "{field} must not exceed {MAX_DELAY_SECS} seconds."
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ReminderError::validation(format!("{field} is out of range: {e}")))
}

/// Wall-clock offset for an already validated delay
pub(crate) fn chrono_from_secs(secs: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(message: &str, seconds: f64) -> ReminderSpec {
        ReminderSpec::Timed {
            message: message.to_string(),
            seconds,
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ReminderKind::Timed.to_string(), "timed");
        assert_eq!(ReminderKind::Event.to_string(), "event");
        assert_eq!(ReminderKind::Recurring.to_string(), "recurring");
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(timed("", 5.0).validate().is_err());
        assert!(timed("   ", 5.0).validate().is_err());
        assert!(timed("hi", 0.0).validate().is_err());
        assert!(timed("hi", -1.0).validate().is_err());
        assert!(timed("hi", f64::NAN).validate().is_err());
        assert!(timed("hi", f64::INFINITY).validate().is_err());
        assert!(timed("hi", MAX_DELAY_SECS * 2.0).validate().is_err());
        assert!(timed("hi", 0.25).validate().is_ok());

        let event = ReminderSpec::Event {
            message: "hi".to_string(),
            event_name: " ".to_string(),
        };
        assert!(event.validate().is_err());

        let recurring = ReminderSpec::Recurring {
            message: "hi".to_string(),
            duration_seconds: 2.0,
            recurrences: 0,
            interval: None,
        };
        assert_eq!(
            recurring.validate(),
            Err(ReminderError::validation("recurrences must be at least 1."))
        );
    }

    #[test]
    fn test_from_spec_recurring() {
        let now = Utc::now();
        let spec = ReminderSpec::Recurring {
            message: "stretch".to_string(),
            duration_seconds: 2.0,
            recurrences: 3,
            interval: None,
        };
        let reminder = Reminder::from_spec(7, &spec, now);

        assert_eq!(reminder.id, 7);
        assert_eq!(reminder.kind, ReminderKind::Recurring);
        assert_eq!(reminder.remaining, Some(3));
        assert_eq!(reminder.recurrences, Some(3));
        assert_eq!(reminder.interval.as_deref(), Some("custom"));
        assert_eq!(reminder.next_trigger, Some(now + chrono::Duration::seconds(2)));
        assert_eq!(reminder.recurrence_interval(), Some(Duration::from_secs(2)));
        assert!(reminder.is_pending());
        assert!(reminder.event_name.is_none());
    }

    #[test]
    fn test_serialized_field_names() {
        let now = Utc::now();
        let spec = ReminderSpec::Event {
            message: "deploy done".to_string(),
            event_name: "deploy".to_string(),
        };
        let value = serde_json::to_value(Reminder::from_spec(1, &spec, now)).unwrap();

        assert_eq!(value["type"], "event");
        assert_eq!(value["eventName"], "deploy");
        assert_eq!(value["fired"], false);
        assert!(value.get("createdAt").is_some());
        assert!(value.get("remaining").is_none());
        assert!(value.get("firedAt").is_none());
    }

    #[test]
    fn test_first_delay() {
        assert_eq!(
            timed("hi", 1.5).first_delay().unwrap(),
            Some(Duration::from_millis(1500))
        );
        let event = ReminderSpec::Event {
            message: "hi".to_string(),
            event_name: "e".to_string(),
        };
        assert_eq!(event.first_delay().unwrap(), None);
    }
}
