//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical todo record read by the due-date engine.
//! - Define write-side inputs (`NewTask`, `TaskUpdate`) used by CRUD paths.
//!
//! # Invariants
//! - `id` is assigned by the store on insert and never changes afterwards.
//! - `title` is non-empty after trimming.
//! - `date_created` is set once at insert time and never mutated.
//! - Flags only move `false -> true` while `date_due` stays the same; a
//!   due-date change resets both to `false`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a task record.
pub type TaskId = Uuid;

/// Persisted boolean that gates re-delivery of one notification class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationFlag {
    /// Set once a due-today notification was shown for the current due date.
    NotificationSentToday,
    /// Set once a due-tomorrow notification was shown for the current due date.
    NotificationSentTomorrow,
}

impl NotificationFlag {
    /// Column name backing this flag in the `todos` table.
    pub fn column(self) -> &'static str {
        match self {
            Self::NotificationSentToday => "notification_sent_today",
            Self::NotificationSentTomorrow => "notification_sent_tomorrow",
        }
    }
}

impl Display for NotificationFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotificationSentToday => write!(f, "notificationSentToday"),
            Self::NotificationSentTomorrow => write!(f, "notificationSentTomorrow"),
        }
    }
}

/// Validation failures for task writes and persisted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Title is empty or whitespace only.
    EmptyTitle,
    /// Task id is the nil UUID.
    NilId,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be empty"),
            Self::NilId => write!(f, "task id must not be nil"),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical todo record.
///
/// Serialized with camelCase field names (`dateDue`, `notificationSentToday`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Free text, may be empty.
    pub description: String,
    /// Unix epoch milliseconds.
    pub date_created: i64,
    /// Unix epoch milliseconds. Only the local calendar day matters to the engine.
    pub date_due: i64,
    pub notification_sent_today: bool,
    pub notification_sent_tomorrow: bool,
}

impl Task {
    /// Checks invariants that every stored task must satisfy.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.is_nil() {
            return Err(TaskValidationError::NilId);
        }
        validate_title(&self.title)
    }

    /// Returns the stored value of one notification flag.
    pub fn flag(&self, flag: NotificationFlag) -> bool {
        match flag {
            NotificationFlag::NotificationSentToday => self.notification_sent_today,
            NotificationFlag::NotificationSentTomorrow => self.notification_sent_tomorrow,
        }
    }
}

/// Insert payload. Flags always start `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub date_due: i64,
    pub date_created: i64,
}

impl NewTask {
    /// Builds an insert payload with a trimmed title.
    ///
    /// # Errors
    /// - `EmptyTitle` when the title is blank.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        date_due: i64,
        date_created: i64,
    ) -> Result<Self, TaskValidationError> {
        let title = title.into();
        validate_title(&title)?;
        Ok(Self {
            title: title.trim().to_string(),
            description: description.into(),
            date_due,
            date_created,
        })
    }
}

/// Full-replacement update payload for user-editable fields.
///
/// Flags are not part of the payload: the store keeps them when `date_due`
/// is unchanged and resets both when it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub date_due: i64,
}

impl TaskUpdate {
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        description: impl Into<String>,
        date_due: i64,
    ) -> Result<Self, TaskValidationError> {
        if id.is_nil() {
            return Err(TaskValidationError::NilId);
        }
        let title = title.into();
        validate_title(&title)?;
        Ok(Self {
            id,
            title: title.trim().to_string(),
            description: description.into(),
            date_due,
        })
    }
}

fn validate_title(title: &str) -> Result<(), TaskValidationError> {
    if title.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{NewTask, NotificationFlag, Task, TaskUpdate, TaskValidationError};
    use uuid::Uuid;

    #[test]
    fn new_task_trims_title_and_keeps_description() {
        let task = NewTask::new("  Report  ", "", 1_700_000_000_000, 1).unwrap();
        assert_eq!(task.title, "Report");
        assert_eq!(task.description, "");
    }

    #[test]
    fn blank_titles_are_rejected() {
        assert_eq!(
            NewTask::new(" \t", "body", 0, 0).unwrap_err(),
            TaskValidationError::EmptyTitle
        );
        assert_eq!(
            TaskUpdate::new(Uuid::new_v4(), "", "", 0).unwrap_err(),
            TaskValidationError::EmptyTitle
        );
    }

    #[test]
    fn update_rejects_nil_id() {
        let err = TaskUpdate::new(Uuid::nil(), "title", "", 0).unwrap_err();
        assert_eq!(err, TaskValidationError::NilId);
    }

    #[test]
    fn flag_accessor_matches_fields() {
        let task = Task {
            id: Uuid::new_v4(),
            title: "x".to_string(),
            description: String::new(),
            date_created: 0,
            date_due: 0,
            notification_sent_today: true,
            notification_sent_tomorrow: false,
        };
        assert!(task.flag(NotificationFlag::NotificationSentToday));
        assert!(!task.flag(NotificationFlag::NotificationSentTomorrow));
        assert_eq!(
            NotificationFlag::NotificationSentTomorrow.column(),
            "notification_sent_tomorrow"
        );
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let task = Task {
            id: Uuid::nil(),
            title: "Report".to_string(),
            description: String::new(),
            date_created: 1,
            date_due: 2,
            notification_sent_today: false,
            notification_sent_tomorrow: true,
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["dateDue"], 2);
        assert_eq!(value["notificationSentTomorrow"], true);
        assert!(value.get("date_due").is_none());
    }
}
