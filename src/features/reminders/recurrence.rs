//! # Recurrence Controller
//!
//! Finite state machine for recurring reminders. The state is the number of
//! fires still owed; each step either re-arms the next interval or finishes.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::core::ReminderResult;
use crate::features::reminders::model::ReminderId;
use crate::features::reminders::timer::TimerService;
use log::debug;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceState {
    Pending { remaining: u32 },
    Exhausted,
}

/// What the coordinator does after applying one fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceStep {
    /// Arm another interval; `remaining` fires are still owed
    Rearm { remaining: u32 },
    /// That was the last fire
    Finish,
}

impl RecurrenceState {
    pub fn from_remaining(remaining: u32) -> Self {
        if remaining == 0 {
            RecurrenceState::Exhausted
        } else {
            RecurrenceState::Pending { remaining }
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RecurrenceState::Pending { remaining } => *remaining,
            RecurrenceState::Exhausted => 0,
        }
    }

    /// Apply one fire. Returns None when the state is already exhausted,
    /// which callers must treat as an invariant violation.
    pub fn advance(self) -> Option<(RecurrenceState, RecurrenceStep)> {
        match self {
            RecurrenceState::Exhausted => None,
            RecurrenceState::Pending { remaining: 1 } => {
                Some((RecurrenceState::Exhausted, RecurrenceStep::Finish))
            }
            RecurrenceState::Pending { remaining } => {
                let remaining = remaining - 1;
                Some((
                    RecurrenceState::Pending { remaining },
                    RecurrenceStep::Rearm { remaining },
                ))
            }
        }
    }
}

/// Re-arms recurring reminders on the shared timer service
#[derive(Clone)]
pub struct RecurrenceController {
    timers: TimerService,
}

impl RecurrenceController {
    pub fn new(timers: TimerService) -> Self {
        Self { timers }
    }

    /// Schedule the next recurrence. Does not wait for it.
    pub fn rearm<F>(
        &self,
        id: ReminderId,
        interval: Duration,
        remaining: u32,
        callback: F,
    ) -> ReminderResult<()>
    where
        F: FnOnce(ReminderId) + Send + 'static,
    {
        debug!("Reminder {id}: {remaining} recurrence(s) left, next in {interval:?}");
        self.timers.arm(id, interval, callback)
    }
}
