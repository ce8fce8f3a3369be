//! Per-task notification decision.
//!
//! Pure logic: no store or surface access, so every rule is unit-testable.

use crate::engine::window::DayWindow;
use crate::model::task::{NotificationFlag, Task};

/// Decision for one task in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationClass {
    DueToday,
    DueTomorrow,
    None,
}

impl NotificationClass {
    /// Flag that records delivery of this class, if any.
    pub fn flag(self) -> Option<NotificationFlag> {
        match self {
            Self::DueToday => Some(NotificationFlag::NotificationSentToday),
            Self::DueTomorrow => Some(NotificationFlag::NotificationSentTomorrow),
            Self::None => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DueToday => "due_today",
            Self::DueTomorrow => "due_tomorrow",
            Self::None => "none",
        }
    }
}

/// Picks the notification class for a scanned task.
///
/// Precedence:
/// 1. due before `tomorrow_start` and today-flag unset -> `DueToday`;
/// 2. due before `day_after_start`, tomorrow-flag unset and today-flag unset
///    -> `DueTomorrow`;
/// 3. otherwise `None`.
///
/// A set today-flag suppresses the tomorrow notification for the same due
/// date even when the date arithmetic alone would allow it.
pub fn classify(task: &Task, window: &DayWindow) -> NotificationClass {
    if task.date_due < window.tomorrow_start && !task.notification_sent_today {
        return NotificationClass::DueToday;
    }

    if task.date_due < window.day_after_start
        && !task.notification_sent_tomorrow
        && !task.notification_sent_today
    {
        return NotificationClass::DueTomorrow;
    }

    NotificationClass::None
}
