//! Due-date notification engine.
//!
//! # Responsibility
//! - Scan the store for tasks due today or tomorrow (local calendar).
//! - Classify each task and dispatch at most one notification per class per
//!   due date, persisting the matching flag.
//! - Drive cycles from a periodic scheduler for the process lifetime.
//!
//! # Invariants
//! - Flags are re-read from the store every cycle; nothing is cached between
//!   cycles.
//! - Classification finishes for the whole scan before any dispatch starts.
//! - At most one cycle runs at a time per engine, and per database file
//!   through the cycle lease.

pub mod classify;
pub mod cycle;
pub mod dispatch;
pub mod scheduler;
pub mod window;

use crate::repo::task_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use classify::{classify, NotificationClass};
pub use cycle::{CyclePhase, CycleReport, DueDateEngine};
pub use dispatch::{dispatch, notification_for, DispatchError, DispatchOutcome};
pub use scheduler::{SchedulerHandle, SchedulerOptions};
pub use window::DayWindow;

/// Cycle-level failure. Never fatal to the scheduler.
#[derive(Debug)]
pub enum EngineError {
    /// The scan could not read from the store; the cycle dispatched nothing.
    StoreUnavailable(RepoError),
    /// Another cycle holds the engine or the store's cycle lease; nothing ran.
    CycleInFlight,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable(err) => write!(f, "task store unavailable: {err}"),
            Self::CycleInFlight => write!(f, "another reminder cycle is already running"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
            Self::CycleInFlight => None,
        }
    }
}
