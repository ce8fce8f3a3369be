#![allow(dead_code)]

use duetask_core::db::open_db_in_memory;
use duetask_core::{
    FlagWrite, NewTask, Notification, NotificationFlag, NotificationSurface, NotifyError, RepoError,
    RepoResult, SqliteTaskStore, Task, TaskId, TaskStore, TaskUpdate,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub fn memory_store() -> Arc<SqliteTaskStore> {
    Arc::new(SqliteTaskStore::new(open_db_in_memory().unwrap()))
}

pub fn insert(store: &impl TaskStore, title: &str, date_due: i64) -> TaskId {
    store
        .insert(&NewTask::new(title, "", date_due, 1_700_000_000_000).unwrap())
        .unwrap()
}

/// Surface that records every shown notification and can be switched off.
#[derive(Default)]
pub struct RecordingSurface {
    shown: Mutex<Vec<Notification>>,
    unavailable: AtomicBool,
    delay_ms: AtomicU64,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes every `show` block for `delay` first.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown().into_iter().map(|n| n.title).collect()
    }
}

impl NotificationSurface for RecordingSurface {
    fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NotifyError::Unavailable("test surface offline".to_string()));
        }
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Store wrapper that injects scan or flag-write failures and slow scans.
pub struct FlakyStore {
    inner: Arc<SqliteTaskStore>,
    pub fail_scans: AtomicBool,
    pub fail_flag_writes: AtomicBool,
    pub flag_writes: AtomicUsize,
    pub scan_delay_ms: AtomicU64,
    active_scans: AtomicUsize,
    pub max_active_scans: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteTaskStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_scans: AtomicBool::new(false),
            fail_flag_writes: AtomicBool::new(false),
            flag_writes: AtomicUsize::new(0),
            scan_delay_ms: AtomicU64::new(0),
            active_scans: AtomicUsize::new(0),
            max_active_scans: AtomicUsize::new(0),
        })
    }

    fn offline() -> RepoError {
        RepoError::InvalidData("store offline".to_string())
    }
}

impl TaskStore for FlakyStore {
    fn insert(&self, task: &NewTask) -> RepoResult<TaskId> {
        self.inner.insert(task)
    }

    fn get(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.inner.get(id)
    }

    fn list_all(&self) -> RepoResult<Vec<Task>> {
        self.inner.list_all()
    }

    fn scan_range(&self, start: i64, end: i64) -> RepoResult<Vec<Task>> {
        let active = self.active_scans.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_scans.fetch_max(active, Ordering::SeqCst);
        let delay = self.scan_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        let result = if self.fail_scans.load(Ordering::SeqCst) {
            Err(Self::offline())
        } else {
            self.inner.scan_range(start, end)
        };
        self.active_scans.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn update_flag(
        &self,
        id: TaskId,
        flag: NotificationFlag,
        value: bool,
        expected_due: i64,
    ) -> RepoResult<FlagWrite> {
        self.flag_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flag_writes.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.update_flag(id, flag, value, expected_due)
    }

    fn update_task(&self, update: &TaskUpdate) -> RepoResult<()> {
        self.inner.update_task(update)
    }

    fn delete(&self, id: TaskId) -> RepoResult<()> {
        self.inner.delete(id)
    }

    fn try_acquire_cycle_lease(&self, holder: &str, now_ms: i64, ttl_ms: i64) -> RepoResult<bool> {
        self.inner.try_acquire_cycle_lease(holder, now_ms, ttl_ms)
    }

    fn release_cycle_lease(&self, holder: &str) -> RepoResult<()> {
        self.inner.release_cycle_lease(holder)
    }
}
