//! Periodic scheduler loop driving engine cycles.
//!
//! # Invariants
//! - The first cycle starts immediately; later cycles follow `check_interval`.
//! - Never two cycles at once: a tick that finds a cycle in flight is skipped.
//! - A failed or timed-out cycle is logged and the loop keeps going.
//! - `stop` does not wait for an in-flight cycle; it is abandoned.

use crate::engine::cycle::DueDateEngine;
use crate::engine::EngineError;
use crate::notify::{Notification, NotificationSurface};
use crate::repo::task_repo::TaskStore;
use chrono::Local;
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub check_interval: Duration,
    /// Upper bound on how long the loop waits for one cycle.
    pub cycle_timeout: Duration,
    /// Show a one-off "Connected to DB" notification on start.
    pub startup_notification: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            startup_notification: true,
        }
    }
}

/// Owned handle to a running scheduler loop.
///
/// Dropping the handle also stops the loop (the shutdown channel closes).
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    completed_cycles: Arc<AtomicU64>,
    failed_cycles: Arc<AtomicU64>,
    skipped_ticks: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Spawns the scheduler loop on the current tokio runtime.
    pub fn start<S, N>(engine: Arc<DueDateEngine<S, N>>, options: SchedulerOptions) -> Self
    where
        S: TaskStore + Send + Sync + 'static,
        N: NotificationSurface + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let completed_cycles = Arc::new(AtomicU64::new(0));
        let failed_cycles = Arc::new(AtomicU64::new(0));
        let skipped_ticks = Arc::new(AtomicU64::new(0));

        let counters = CycleCounters {
            completed: Arc::clone(&completed_cycles),
            failed: Arc::clone(&failed_cycles),
            skipped: Arc::clone(&skipped_ticks),
        };
        let join = tokio::spawn(run_loop(engine, options, shutdown_rx, counters));

        Self {
            shutdown: Some(shutdown_tx),
            join: Some(join),
            completed_cycles,
            failed_cycles,
            skipped_ticks,
        }
    }

    /// Cycles that finished without a store error.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles.load(Ordering::SeqCst)
    }

    /// Cycles that aborted, panicked or timed out.
    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles.load(Ordering::SeqCst)
    }

    /// Ticks that started no cycle because one was still in flight.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Signals shutdown and waits for the loop to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                error!("event=scheduler_stop module=engine status=error error={err}");
                return;
            }
        }
        info!("event=scheduler_stop module=engine status=ok");
    }
}

struct CycleCounters {
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

/// Clears the in-flight marker when the blocking cycle ends, even on panic.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_loop<S, N>(
    engine: Arc<DueDateEngine<S, N>>,
    options: SchedulerOptions,
    mut shutdown: oneshot::Receiver<()>,
    counters: CycleCounters,
) where
    S: TaskStore + Send + Sync + 'static,
    N: NotificationSurface + Send + Sync + 'static,
{
    info!(
        "event=scheduler_start module=engine status=ok interval_secs={} cycle_timeout_secs={}",
        options.check_interval.as_secs(),
        options.cycle_timeout.as_secs()
    );

    if options.startup_notification {
        let startup_engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || {
            let notification =
                Notification::new("Connected to DB", "Connected to database successfully.");
            if let Err(err) = startup_engine.surface().show(&notification) {
                warn!("event=scheduler_start module=engine status=degraded error={err}");
            }
        });
    }

    let mut interval = tokio::time::interval(options.check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        if in_flight.swap(true, Ordering::SeqCst) {
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            warn!("event=scheduler_tick_skipped module=engine status=skipped reason=cycle_in_flight");
            continue;
        }

        let cycle_engine = Arc::clone(&engine);
        let guard = InFlightGuard(Arc::clone(&in_flight));
        let cycle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            cycle_engine.run_cycle(&Local::now())
        });

        tokio::select! {
            _ = &mut shutdown => break,
            outcome = tokio::time::timeout(options.cycle_timeout, cycle) => match outcome {
                Ok(Ok(Ok(_report))) => {
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Ok(Err(EngineError::CycleInFlight))) => {
                    counters.skipped.fetch_add(1, Ordering::SeqCst);
                    warn!("event=scheduler_tick_skipped module=engine status=skipped reason=lease_held");
                }
                Ok(Ok(Err(err))) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    error!("event=engine_cycle module=engine status=error error_code=store_unavailable error={err}");
                }
                Ok(Err(join_err)) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    error!("event=engine_cycle module=engine status=error error_code=cycle_panicked error={join_err}");
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    warn!(
                        "event=engine_cycle module=engine status=timeout timeout_secs={}",
                        options.cycle_timeout.as_secs()
                    );
                }
            }
        }
    }

    engine.mark_stopped();
}
