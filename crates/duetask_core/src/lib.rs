//! Core of the duetask tracker: task store, CRUD service and the due-date
//! notification engine.
//! This crate is the single source of truth for task and flag invariants.

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;
pub mod time;

pub use config::{load_config, Config, ConfigError};
pub use engine::{
    classify, CyclePhase, CycleReport, DayWindow, DispatchError, DispatchOutcome, DueDateEngine,
    EngineError, NotificationClass, SchedulerHandle, SchedulerOptions,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{NewTask, NotificationFlag, Task, TaskId, TaskUpdate, TaskValidationError};
pub use notify::{
    surface_for, DesktopSurface, LogSurface, Notification, NotificationBackend,
    NotificationSurface, NotifyError, SharedSurface,
};
pub use repo::task_repo::{FlagWrite, RepoError, RepoResult, SqliteTaskStore, TaskStore};
pub use service::task_service::{ServiceError, TaskService};
pub use time::{format_due_date, parse_due_date, DueDateParseError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
