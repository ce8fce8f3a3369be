//! Notification delivery and flag persistence for one classified task.
//!
//! # Invariants
//! - The flag is written only after the surface accepted the notification.
//! - Exactly one single-column flag update is issued per delivered notification.
//! - The flag write is conditional on the due date the task was classified
//!   with; a date moved mid-cycle keeps its fresh flags.
//! - A failed flag write after a shown notification means the task may be
//!   notified again next cycle (at-least-once delivery).

use crate::engine::classify::NotificationClass;
use crate::model::task::{NotificationFlag, Task, TaskId};
use crate::notify::{Notification, NotificationSurface, NotifyError};
use crate::repo::task_repo::{FlagWrite, RepoError, TaskStore};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Successful dispatch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Notification shown and flag persisted.
    Sent(NotificationFlag),
    /// Notification shown, but the due date moved before the flag write.
    Superseded(NotificationFlag),
    /// Class was `None`; nothing happened.
    Skipped,
}

#[derive(Debug)]
pub enum DispatchError {
    /// Surface could not show the notification; no flag was written.
    NotificationSurfaceUnavailable { task_id: TaskId, source: NotifyError },
    /// Notification was shown but the flag write failed.
    FlagWriteFailed {
        task_id: TaskId,
        flag: NotificationFlag,
        source: RepoError,
    },
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotificationSurfaceUnavailable { task_id, source } => {
                write!(f, "cannot notify for task {task_id}: {source}")
            }
            Self::FlagWriteFailed {
                task_id,
                flag,
                source,
            } => write!(
                f,
                "notified for task {task_id} but could not persist {flag}: {source}"
            ),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotificationSurfaceUnavailable { source, .. } => Some(source),
            Self::FlagWriteFailed { source, .. } => Some(source),
        }
    }
}

/// Builds the user-facing notification for a class, or `None` for `NotificationClass::None`.
pub fn notification_for(task: &Task, class: NotificationClass) -> Option<Notification> {
    match class {
        NotificationClass::DueToday => Some(Notification::new(
            "Task Due Today",
            format!("Task \"{}\" is due today.", task.title),
        )),
        NotificationClass::DueTomorrow => Some(Notification::new(
            "Task Due Tomorrow",
            format!("Task \"{}\" is due tomorrow.", task.title),
        )),
        NotificationClass::None => None,
    }
}

/// Shows the notification for `class` and marks the matching flag.
pub fn dispatch<S, N>(
    store: &S,
    surface: &N,
    task: &Task,
    class: NotificationClass,
) -> Result<DispatchOutcome, DispatchError>
where
    S: TaskStore + ?Sized,
    N: NotificationSurface + ?Sized,
{
    let (Some(notification), Some(flag)) = (notification_for(task, class), class.flag()) else {
        return Ok(DispatchOutcome::Skipped);
    };

    if let Err(source) = surface.show(&notification) {
        warn!(
            "event=engine_dispatch module=engine status=error task_id={} class={} error_code=surface_unavailable error={}",
            task.id,
            class.as_str(),
            source
        );
        return Err(DispatchError::NotificationSurfaceUnavailable {
            task_id: task.id,
            source,
        });
    }

    match store.update_flag(task.id, flag, true, task.date_due) {
        Ok(FlagWrite::Written) => {}
        Ok(FlagWrite::DueDateChanged) => {
            info!(
                "event=engine_flag_write module=engine status=superseded task_id={} flag={}",
                task.id, flag
            );
            return Ok(DispatchOutcome::Superseded(flag));
        }
        Err(source) => {
            warn!(
                "event=engine_flag_write module=engine status=error task_id={} flag={} error_code=flag_write_failed error={}",
                task.id, flag, source
            );
            return Err(DispatchError::FlagWriteFailed {
                task_id: task.id,
                flag,
                source,
            });
        }
    }

    debug!(
        "event=engine_dispatch module=engine status=ok task_id={} class={}",
        task.id,
        class.as_str()
    );
    Ok(DispatchOutcome::Sent(flag))
}
