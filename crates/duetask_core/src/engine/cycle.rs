//! One scan-classify-dispatch pass.
//!
//! # Invariants
//! - One engine runs at most one cycle at a time; a concurrent call returns
//!   `EngineError::CycleInFlight` without touching the store.
//! - Engines sharing a database file (e.g. `duetask run` and `duetask check`)
//!   serialize through the store's cycle lease.

use crate::engine::classify::{classify, NotificationClass};
use crate::engine::dispatch::{dispatch, DispatchError, DispatchOutcome};
use crate::engine::window::DayWindow;
use crate::engine::EngineError;
use crate::model::task::Task;
use crate::notify::NotificationSurface;
use crate::repo::task_repo::TaskStore;
use chrono::{DateTime, TimeZone};
use log::{error, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Lease lifetime; long enough to cover a slow cycle, short enough that a
/// crashed process does not block reminders for long.
const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(10 * 60);

/// Scheduler-visible state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Scanning,
    Classifying,
    Dispatching,
    Stopped,
}

impl CyclePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scanning,
            2 => Self::Classifying,
            3 => Self::Dispatching,
            4 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Scanning => 1,
            Self::Classifying => 2,
            Self::Dispatching => 3,
            Self::Stopped => 4,
        }
    }
}

/// Counters for one finished cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scanned: usize,
    pub due_today: usize,
    pub due_tomorrow: usize,
    pub surface_failures: usize,
    pub flag_write_failures: usize,
}

impl CycleReport {
    /// Notifications shown this cycle, including ones whose flag write failed.
    pub fn notified(&self) -> usize {
        self.due_today + self.due_tomorrow
    }
}

/// Engine bound to one record store and one notification surface.
///
/// Holds no task state between cycles.
pub struct DueDateEngine<S, N> {
    store: S,
    surface: N,
    phase: AtomicU8,
    cycle_lock: Mutex<()>,
    lease_holder: String,
    lease_ttl: Duration,
}

impl<S: TaskStore, N: NotificationSurface> DueDateEngine<S, N> {
    pub fn new(store: S, surface: N) -> Self {
        Self {
            store,
            surface,
            phase: AtomicU8::new(CyclePhase::Idle.as_u8()),
            cycle_lock: Mutex::new(()),
            lease_holder: Uuid::new_v4().to_string(),
            lease_ttl: DEFAULT_LEASE_TTL,
        }
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Identity this engine uses for the store's cycle lease.
    pub fn lease_holder(&self) -> &str {
        &self.lease_holder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn surface(&self) -> &N {
        &self.surface
    }

    pub fn phase(&self) -> CyclePhase {
        CyclePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub(crate) fn mark_stopped(&self) {
        self.set_phase(CyclePhase::Stopped);
    }

    /// Reads all tasks due in `[today_start, day_after_start)`.
    pub fn scan(&self, window: &DayWindow) -> Result<Vec<Task>, EngineError> {
        let (start, end) = window.scan_range();
        self.store.scan_range(start, end).map_err(|err| {
            error!(
                "event=engine_scan module=engine status=error error_code=store_unavailable error={err}"
            );
            EngineError::StoreUnavailable(err)
        })
    }

    /// Runs one full cycle for the local day containing `now`.
    ///
    /// Per-task dispatch failures are counted and logged; only a failed scan
    /// aborts the cycle. Returns `CycleInFlight` without scanning when this
    /// engine or another lease holder is mid-cycle. The lease expiry is
    /// measured against `now`.
    pub fn run_cycle<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<CycleReport, EngineError> {
        let _cycle = match self.cycle_lock.try_lock() {
            Ok(guard) => guard,
            // A panicked cycle leaves no state behind the unit lock.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("event=engine_cycle module=engine status=skipped reason=cycle_in_flight");
                return Err(EngineError::CycleInFlight);
            }
        };

        let now_ms = now.timestamp_millis();
        let ttl_ms = i64::try_from(self.lease_ttl.as_millis()).unwrap_or(i64::MAX);
        match self
            .store
            .try_acquire_cycle_lease(&self.lease_holder, now_ms, ttl_ms)
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("event=engine_cycle module=engine status=skipped reason=lease_held");
                return Err(EngineError::CycleInFlight);
            }
            Err(err) => {
                error!(
                    "event=engine_lease module=engine status=error error_code=store_unavailable error={err}"
                );
                return Err(EngineError::StoreUnavailable(err));
            }
        }

        let result = self.run_leased_cycle(&DayWindow::containing(now));
        if let Err(err) = self.store.release_cycle_lease(&self.lease_holder) {
            warn!("event=engine_lease module=engine status=error error_code=lease_release_failed error={err}");
        }
        result
    }

    fn run_leased_cycle(&self, window: &DayWindow) -> Result<CycleReport, EngineError> {
        let started_at = Instant::now();

        self.set_phase(CyclePhase::Scanning);
        let tasks = match self.scan(window) {
            Ok(tasks) => tasks,
            Err(err) => {
                self.set_phase(CyclePhase::Idle);
                return Err(err);
            }
        };

        self.set_phase(CyclePhase::Classifying);
        let mut report = CycleReport {
            scanned: tasks.len(),
            ..CycleReport::default()
        };
        let decisions: Vec<(Task, NotificationClass)> = tasks
            .into_iter()
            .map(|task| {
                let class = classify(&task, window);
                (task, class)
            })
            .filter(|(_, class)| *class != NotificationClass::None)
            .collect();

        self.set_phase(CyclePhase::Dispatching);
        for (task, class) in &decisions {
            match dispatch(&self.store, &self.surface, task, *class) {
                Ok(DispatchOutcome::Sent(_) | DispatchOutcome::Superseded(_)) => {
                    report.count_shown(*class)
                }
                Ok(DispatchOutcome::Skipped) => {}
                Err(DispatchError::NotificationSurfaceUnavailable { .. }) => {
                    report.surface_failures += 1;
                }
                Err(DispatchError::FlagWriteFailed { .. }) => {
                    report.count_shown(*class);
                    report.flag_write_failures += 1;
                }
            }
        }

        self.set_phase(CyclePhase::Idle);
        info!(
            "event=engine_cycle module=engine status=ok duration_ms={} scanned={} actionable={} due_today={} due_tomorrow={} surface_failures={} flag_write_failures={}",
            started_at.elapsed().as_millis(),
            report.scanned,
            decisions.len(),
            report.due_today,
            report.due_tomorrow,
            report.surface_failures,
            report.flag_write_failures
        );
        Ok(report)
    }

    fn set_phase(&self, phase: CyclePhase) {
        // Stopped is terminal.
        let _ = self
            .phase
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != CyclePhase::Stopped.as_u8()).then_some(phase.as_u8())
            });
    }
}

impl CycleReport {
    fn count_shown(&mut self, class: NotificationClass) {
        match class {
            NotificationClass::DueToday => self.due_today += 1,
            NotificationClass::DueTomorrow => self.due_tomorrow += 1,
            NotificationClass::None => {}
        }
    }
}
