//! Task CRUD service.
//!
//! # Responsibility
//! - Provide create/list/get/update/delete entry points for UI callers.
//! - Show best-effort confirmation notifications after successful writes.
//!
//! # Invariants
//! - Blank titles never reach the store.
//! - Updating the due date resets both notification flags (enforced by the
//!   store in the same statement).
//! - A failed confirmation notification never fails the CRUD operation.
//! - Nothing is retried here; callers resubmit on error.

use crate::model::task::{NewTask, Task, TaskId, TaskUpdate, TaskValidationError};
use crate::notify::{Notification, NotificationSurface};
use crate::repo::task_repo::{RepoError, TaskStore};
use chrono::Utc;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ServiceError {
    Validation(TaskValidationError),
    TaskNotFound(TaskId),
    Repo(RepoError),
    /// A write succeeded but its read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent task state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for ServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// CRUD facade over a record store.
pub struct TaskService<S, N> {
    store: S,
    surface: N,
    confirmations: bool,
}

impl<S: TaskStore, N: NotificationSurface> TaskService<S, N> {
    /// Creates a service with confirmations enabled.
    pub fn new(store: S, surface: N) -> Self {
        Self {
            store,
            surface,
            confirmations: true,
        }
    }

    pub fn with_confirmations(mut self, enabled: bool) -> Self {
        self.confirmations = enabled;
        self
    }

    /// Creates a task; both flags start `false`.
    pub fn create_task(
        &self,
        title: &str,
        description: &str,
        date_due: i64,
    ) -> Result<Task, ServiceError> {
        let new_task = NewTask::new(title, description, date_due, Utc::now().timestamp_millis())?;
        let id = self.store.insert(&new_task)?;
        let task = self
            .store
            .get(id)?
            .ok_or(ServiceError::InconsistentState("created task not found in read-back"))?;

        info!("event=task_create module=service status=ok task_id={id}");
        self.confirm(
            "Task Created",
            format!("Task \"{}\" created successfully.", task.title),
        );
        Ok(task)
    }

    /// All tasks, earliest due first.
    pub fn list_tasks(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.store.list_all()?)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, ServiceError> {
        Ok(self.store.get(id)?)
    }

    /// Replaces title, description and due date.
    ///
    /// A changed due date makes the task eligible for fresh notifications.
    pub fn update_task(
        &self,
        id: TaskId,
        title: &str,
        description: &str,
        date_due: i64,
    ) -> Result<Task, ServiceError> {
        let update = TaskUpdate::new(id, title, description, date_due)?;
        self.store.update_task(&update)?;
        let task = self
            .store
            .get(id)?
            .ok_or(ServiceError::InconsistentState("updated task not found in read-back"))?;

        info!("event=task_update module=service status=ok task_id={id}");
        self.confirm(
            "Task Updated",
            format!("Task \"{}\" updated successfully.", task.title),
        );
        Ok(task)
    }

    pub fn delete_task(&self, id: TaskId) -> Result<(), ServiceError> {
        self.store.delete(id)?;
        info!("event=task_delete module=service status=ok task_id={id}");
        self.confirm("Task Deleted", "Task deleted successfully.".to_string());
        Ok(())
    }

    fn confirm(&self, title: &str, body: String) {
        if !self.confirmations {
            return;
        }
        if let Err(err) = self.surface.show(&Notification::new(title, body)) {
            warn!("event=task_confirmation module=service status=error error={err}");
        }
    }
}
