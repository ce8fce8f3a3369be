mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{insert, memory_store, FlakyStore, RecordingSurface, DAY_MS};
use duetask_core::db::open_db;
use duetask_core::engine::{dispatch, DispatchOutcome, NotificationClass};
use duetask_core::{
    CyclePhase, DayWindow, DueDateEngine, EngineError, NotificationFlag, SqliteTaskStore,
    TaskService, TaskStore, TaskUpdate,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

fn window() -> DayWindow {
    DayWindow::containing(&now())
}

#[test]
fn due_today_task_is_notified_once_and_flagged() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&store, "Report", window().today_start);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    let first = engine.run_cycle(&now()).unwrap();
    assert_eq!(first.scanned, 1);
    assert_eq!(first.due_today, 1);
    assert_eq!(first.due_tomorrow, 0);

    let task = store.get(id).unwrap().unwrap();
    assert!(task.notification_sent_today);
    assert!(!task.notification_sent_tomorrow);

    let shown = surface.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Task Due Today");
    assert_eq!(shown[0].body, "Task \"Report\" is due today.");

    let second = engine.run_cycle(&now()).unwrap();
    assert_eq!(second.notified(), 0);
    assert_eq!(surface.shown().len(), 1);
}

#[test]
fn due_tomorrow_task_is_notified_once_and_flagged() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&store, "Review", window().tomorrow_start);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    let report = engine.run_cycle(&now()).unwrap();
    assert_eq!(report.due_tomorrow, 1);
    assert_eq!(report.due_today, 0);

    let task = store.get(id).unwrap().unwrap();
    assert!(!task.notification_sent_today);
    assert!(task.notification_sent_tomorrow);
    assert_eq!(surface.shown()[0].title, "Task Due Tomorrow");
    assert_eq!(surface.shown()[0].body, "Task \"Review\" is due tomorrow.");
}

#[test]
fn tasks_outside_window_are_not_touched() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let w = window();
    let later = insert(&store, "Later", w.day_after_start);
    let overdue = insert(&store, "Overdue", w.today_start - 1);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    let report = engine.run_cycle(&now()).unwrap();
    assert_eq!(report.scanned, 0);
    assert!(surface.shown().is_empty());

    for id in [later, overdue] {
        let task = store.get(id).unwrap().unwrap();
        assert!(!task.notification_sent_today);
        assert!(!task.notification_sent_tomorrow);
    }
}

#[test]
fn today_flag_suppresses_tomorrow_notification() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&store, "Shifted", window().tomorrow_start + 1);
    store
        .update_flag(
            id,
            NotificationFlag::NotificationSentToday,
            true,
            window().tomorrow_start + 1,
        )
        .unwrap();
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    let report = engine.run_cycle(&now()).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.notified(), 0);
    assert!(surface.shown().is_empty());
    assert!(!store.get(id).unwrap().unwrap().notification_sent_tomorrow);
}

#[test]
fn due_date_change_makes_task_eligible_again() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let w = window();
    let service = TaskService::new(store.clone(), surface.clone()).with_confirmations(false);
    let task = service.create_task("Moved", "", w.today_start).unwrap();
    store
        .update_flag(task.id, NotificationFlag::NotificationSentToday, true, w.today_start)
        .unwrap();

    let updated = service
        .update_task(task.id, "Moved", "", w.tomorrow_start)
        .unwrap();
    assert!(!updated.notification_sent_today);
    assert!(!updated.notification_sent_tomorrow);

    let engine = DueDateEngine::new(store.clone(), surface.clone());
    let report = engine.run_cycle(&now()).unwrap();
    assert_eq!(report.due_tomorrow, 1);
    assert_eq!(surface.titles(), vec!["Task Due Tomorrow"]);
}

#[test]
fn repeated_cycles_notify_each_class_at_most_once() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let w = window();
    insert(&store, "a", w.today_start);
    insert(&store, "b", w.today_start + 3_600_000);
    insert(&store, "c", w.tomorrow_start);
    insert(&store, "d", w.day_after_start - 1);
    insert(&store, "e", w.day_after_start + DAY_MS);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    let mut today = 0;
    let mut tomorrow = 0;
    for _ in 0..5 {
        let report = engine.run_cycle(&now()).unwrap();
        today += report.due_today;
        tomorrow += report.due_tomorrow;
    }

    assert_eq!(today, 2);
    assert_eq!(tomorrow, 2);
    assert_eq!(surface.shown().len(), 4);
}

#[test]
fn day_rollover_turns_tomorrow_into_today() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&store, "Rollover", window().tomorrow_start);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    engine.run_cycle(&now()).unwrap();
    let next_day = now() + Duration::days(1);
    let report = engine.run_cycle(&next_day).unwrap();

    assert_eq!(report.due_today, 1);
    let task = store.get(id).unwrap().unwrap();
    assert!(task.notification_sent_today);
    assert!(task.notification_sent_tomorrow);
    assert_eq!(surface.titles(), vec!["Task Due Tomorrow", "Task Due Today"]);
}

#[test]
fn unavailable_surface_leaves_flags_and_retries_next_cycle() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&store, "Retry", window().today_start);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    surface.set_unavailable(true);
    let failed = engine.run_cycle(&now()).unwrap();
    assert_eq!(failed.surface_failures, 1);
    assert_eq!(failed.notified(), 0);
    assert!(!store.get(id).unwrap().unwrap().notification_sent_today);

    surface.set_unavailable(false);
    let retried = engine.run_cycle(&now()).unwrap();
    assert_eq!(retried.due_today, 1);
    assert!(store.get(id).unwrap().unwrap().notification_sent_today);
}

#[test]
fn failed_flag_write_redelivers_next_cycle() {
    let inner = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&inner, "Twice", window().today_start);
    let store = FlakyStore::new(inner.clone());
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    store.fail_flag_writes.store(true, Ordering::SeqCst);
    let first = engine.run_cycle(&now()).unwrap();
    assert_eq!(first.due_today, 1);
    assert_eq!(first.flag_write_failures, 1);
    assert!(!inner.get(id).unwrap().unwrap().notification_sent_today);

    store.fail_flag_writes.store(false, Ordering::SeqCst);
    engine.run_cycle(&now()).unwrap();
    assert_eq!(surface.shown().len(), 2);
    assert!(inner.get(id).unwrap().unwrap().notification_sent_today);
    assert_eq!(store.flag_writes.load(Ordering::SeqCst), 2);
}

#[test]
fn scan_failure_aborts_cycle_without_dispatch() {
    let inner = memory_store();
    let surface = RecordingSurface::new();
    insert(&inner, "Unreachable", window().today_start);
    let store = FlakyStore::new(inner);
    store.fail_scans.store(true, Ordering::SeqCst);
    let engine = DueDateEngine::new(store.clone(), surface.clone());

    let err = engine.run_cycle(&now()).unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)));
    assert!(surface.shown().is_empty());
    assert_eq!(store.flag_writes.load(Ordering::SeqCst), 0);
    assert_eq!(engine.phase(), CyclePhase::Idle);
}

#[test]
fn deleted_task_is_not_scanned_next_cycle() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let id = insert(&store, "Gone", window().today_start);
    store.delete(id).unwrap();

    let engine = DueDateEngine::new(store, surface.clone());
    let report = engine.run_cycle(&now()).unwrap();
    assert_eq!(report.scanned, 0);
    assert!(surface.shown().is_empty());
}

#[test]
fn concurrent_cycles_on_one_engine_notify_once() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    surface.set_delay(StdDuration::from_millis(300));
    insert(&store, "Report", window().today_start);
    let engine = Arc::new(DueDateEngine::new(store, surface.clone()));

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = Arc::clone(&engine);
                scope.spawn(move || engine.run_cycle(&now()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let delivered: usize = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .map(|report| report.due_today)
        .sum();
    assert_eq!(delivered, 1);
    assert_eq!(surface.shown().len(), 1);
    assert!(results
        .iter()
        .all(|result| matches!(result, Ok(_) | Err(EngineError::CycleInFlight))));
}

#[test]
fn engines_sharing_a_database_file_take_turns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.sqlite3");
    let daemon_store = Arc::new(SqliteTaskStore::new(open_db(&path).unwrap()));
    let check_store = Arc::new(SqliteTaskStore::new(open_db(&path).unwrap()));
    insert(&daemon_store, "Shared", window().today_start);

    let surface = RecordingSurface::new();
    let daemon = DueDateEngine::new(daemon_store.clone(), surface.clone());
    let check = DueDateEngine::new(check_store, surface.clone());

    // Daemon mid-cycle: it holds the lease.
    let now_ms = now().timestamp_millis();
    assert!(daemon_store
        .try_acquire_cycle_lease(daemon.lease_holder(), now_ms, 60_000)
        .unwrap());

    let err = check.run_cycle(&now()).unwrap_err();
    assert!(matches!(err, EngineError::CycleInFlight));
    assert!(surface.shown().is_empty());

    daemon_store.release_cycle_lease(daemon.lease_holder()).unwrap();
    assert_eq!(check.run_cycle(&now()).unwrap().due_today, 1);
    assert_eq!(daemon.run_cycle(&now()).unwrap().notified(), 0);
    assert_eq!(surface.shown().len(), 1);
}

#[test]
fn expired_lease_from_a_dead_process_is_taken_over() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    insert(&store, "Orphaned", window().today_start);
    let now_ms = now().timestamp_millis();
    assert!(store
        .try_acquire_cycle_lease("crashed-process", now_ms - 120_000, 60_000)
        .unwrap());

    let engine = DueDateEngine::new(store, surface.clone());
    assert_eq!(engine.run_cycle(&now()).unwrap().due_today, 1);
}

#[test]
fn unparseable_row_does_not_block_other_reminders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.sqlite3");
    let raw = open_db(&path).unwrap();
    raw.execute(
        "INSERT INTO todos (id, title, date_created, date_due) VALUES ('legacy-1', 'x', 0, ?1);",
        [window().today_start],
    )
    .unwrap();

    let store = Arc::new(SqliteTaskStore::new(open_db(&path).unwrap()));
    insert(&store, "Report", window().today_start);
    let surface = RecordingSurface::new();
    let engine = DueDateEngine::new(store, surface.clone());

    let report = engine.run_cycle(&now()).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.due_today, 1);
    assert_eq!(surface.shown()[0].body, "Task \"Report\" is due today.");
}

#[test]
fn flag_is_not_written_when_due_date_moves_mid_cycle() {
    let store = memory_store();
    let surface = RecordingSurface::new();
    let w = window();
    let id = insert(&store, "Moving", w.today_start);
    let scanned = store.get(id).unwrap().unwrap();

    let update = TaskUpdate::new(id, "Moving", "", w.tomorrow_start).unwrap();
    store.update_task(&update).unwrap();

    let outcome = dispatch(&store, &surface, &scanned, NotificationClass::DueToday).unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Superseded(NotificationFlag::NotificationSentToday)
    );
    let task = store.get(id).unwrap().unwrap();
    assert!(!task.notification_sent_today);

    let engine = DueDateEngine::new(store, surface.clone());
    assert_eq!(engine.run_cycle(&now()).unwrap().due_tomorrow, 1);
}
