//! Task record store: contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/get/scan/update/delete APIs over the `todos` table.
//! - Own the atomic "reset flags when the due date moves" rule.
//!
//! # Invariants
//! - `scan_range` is inclusive on `start` and exclusive on `end`.
//! - `update_task` never overwrites flags with caller-side copies; it keeps the
//!   stored values or resets both inside one statement.
//! - `update_flag` touches exactly one column of exactly one row, and only
//!   while the row still has the due date the flag was computed for.
//! - `scan_range` skips rows that fail to parse; `list_all` and `get` reject them.
//! - At most one holder owns the cycle lease until it expires or is released.

use crate::db::DbError;
use crate::model::task::{NewTask, NotificationFlag, Task, TaskId, TaskUpdate, TaskValidationError};
use log::warn;
use rusqlite::types::FromSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    date_created,
    date_due,
    notification_sent_today,
    notification_sent_tomorrow
FROM todos";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
    /// A previous holder of the connection panicked mid-call.
    ConnectionPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::ConnectionPoisoned => write!(f, "task store connection is poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of a conditional flag write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagWrite {
    Written,
    /// The row's due date moved since the flag was computed; nothing written.
    DueDateChanged,
}

/// Record store contract.
///
/// Every method is one independent call against the store; callers must not
/// assume any state survives between calls.
pub trait TaskStore {
    /// Inserts a task with both flags `false` and returns its new id.
    fn insert(&self, task: &NewTask) -> RepoResult<TaskId>;
    fn get(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Full scan ordered by `date_due ASC, id ASC`.
    fn list_all(&self) -> RepoResult<Vec<Task>>;
    /// Tasks with `start <= date_due < end` (epoch milliseconds).
    fn scan_range(&self, start: i64, end: i64) -> RepoResult<Vec<Task>>;
    /// Sets `flag` on `id` if its stored due date still equals `expected_due`.
    fn update_flag(
        &self,
        id: TaskId,
        flag: NotificationFlag,
        value: bool,
        expected_due: i64,
    ) -> RepoResult<FlagWrite>;
    /// Replaces title/description/due date; resets flags when the due date changes.
    fn update_task(&self, update: &TaskUpdate) -> RepoResult<()>;
    fn delete(&self, id: TaskId) -> RepoResult<()>;

    /// Claims the cycle lease for `holder` until `now_ms + ttl_ms`.
    ///
    /// Returns `false` while another holder's lease is unexpired. Stores that
    /// are never shared between processes keep the default.
    fn try_acquire_cycle_lease(&self, _holder: &str, _now_ms: i64, _ttl_ms: i64) -> RepoResult<bool> {
        Ok(true)
    }

    /// Drops the lease if `holder` still owns it.
    fn release_cycle_lease(&self, _holder: &str) -> RepoResult<()> {
        Ok(())
    }
}

impl<S: TaskStore + ?Sized> TaskStore for std::sync::Arc<S> {
    fn insert(&self, task: &NewTask) -> RepoResult<TaskId> {
        (**self).insert(task)
    }

    fn get(&self, id: TaskId) -> RepoResult<Option<Task>> {
        (**self).get(id)
    }

    fn list_all(&self) -> RepoResult<Vec<Task>> {
        (**self).list_all()
    }

    fn scan_range(&self, start: i64, end: i64) -> RepoResult<Vec<Task>> {
        (**self).scan_range(start, end)
    }

    fn update_flag(
        &self,
        id: TaskId,
        flag: NotificationFlag,
        value: bool,
        expected_due: i64,
    ) -> RepoResult<FlagWrite> {
        (**self).update_flag(id, flag, value, expected_due)
    }

    fn update_task(&self, update: &TaskUpdate) -> RepoResult<()> {
        (**self).update_task(update)
    }

    fn delete(&self, id: TaskId) -> RepoResult<()> {
        (**self).delete(id)
    }

    fn try_acquire_cycle_lease(&self, holder: &str, now_ms: i64, ttl_ms: i64) -> RepoResult<bool> {
        (**self).try_acquire_cycle_lease(holder, now_ms, ttl_ms)
    }

    fn release_cycle_lease(&self, holder: &str) -> RepoResult<()> {
        (**self).release_cycle_lease(holder)
    }
}

/// SQLite-backed record store.
///
/// Owns its connection behind a mutex so one store can be shared by the
/// scheduler thread and CRUD callers.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Wraps a connection returned by `open_db` / `open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::ConnectionPoisoned)
    }

    fn query_tasks(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        policy: BadRowPolicy,
    ) -> RepoResult<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            match (parse_task_row(row), policy) {
                (Ok(task), _) => tasks.push(task),
                (
                    Err(err @ (RepoError::InvalidData(_) | RepoError::Validation(_))),
                    BadRowPolicy::Skip,
                ) => {
                    warn!(
                        "event=task_scan module=repo status=skipped error_code=invalid_row error={err}"
                    );
                }
                (Err(err), _) => return Err(err),
            }
        }
        Ok(tasks)
    }
}

#[derive(Debug, Clone, Copy)]
enum BadRowPolicy {
    Reject,
    Skip,
}

impl TaskStore for SqliteTaskStore {
    fn insert(&self, task: &NewTask) -> RepoResult<TaskId> {
        if task.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle.into());
        }

        let id = Uuid::new_v4();
        self.conn()?.execute(
            "INSERT INTO todos (
                id,
                title,
                description,
                date_created,
                date_due,
                notification_sent_today,
                notification_sent_tomorrow
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0);",
            params![
                id.to_string(),
                task.title.as_str(),
                task.description.as_str(),
                task.date_created,
                task.date_due,
            ],
        )?;

        Ok(id)
    }

    fn get(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(parse_task_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_all(&self) -> RepoResult<Vec<Task>> {
        self.query_tasks(
            &format!("{TASK_SELECT_SQL} ORDER BY date_due ASC, id ASC;"),
            params![],
            BadRowPolicy::Reject,
        )
    }

    fn scan_range(&self, start: i64, end: i64) -> RepoResult<Vec<Task>> {
        self.query_tasks(
            &format!(
                "{TASK_SELECT_SQL}
                 WHERE date_due >= ?1 AND date_due < ?2
                 ORDER BY date_due ASC, id ASC;"
            ),
            params![start, end],
            BadRowPolicy::Skip,
        )
    }

    fn update_flag(
        &self,
        id: TaskId,
        flag: NotificationFlag,
        value: bool,
        expected_due: i64,
    ) -> RepoResult<FlagWrite> {
        // Column names come from a closed enum, never from caller input.
        let sql = format!(
            "UPDATE todos SET {} = ?1 WHERE id = ?2 AND date_due = ?3;",
            flag.column()
        );
        let conn = self.conn()?;
        let changed = conn.execute(&sql, params![bool_to_int(value), id.to_string(), expected_due])?;
        if changed > 0 {
            return Ok(FlagWrite::Written);
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM todos WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            Ok(FlagWrite::DueDateChanged)
        } else {
            Err(RepoError::NotFound(id))
        }
    }

    fn update_task(&self, update: &TaskUpdate) -> RepoResult<()> {
        if update.id.is_nil() {
            return Err(TaskValidationError::NilId.into());
        }
        if update.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle.into());
        }

        // SET expressions see the pre-update row, so the CASE compares against
        // the stored due date.
        let changed = self.conn()?.execute(
            "UPDATE todos
             SET
                title = ?2,
                description = ?3,
                notification_sent_today =
                    CASE WHEN date_due = ?4 THEN notification_sent_today ELSE 0 END,
                notification_sent_tomorrow =
                    CASE WHEN date_due = ?4 THEN notification_sent_tomorrow ELSE 0 END,
                date_due = ?4
             WHERE id = ?1;",
            params![
                update.id.to_string(),
                update.title.as_str(),
                update.description.as_str(),
                update.date_due,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(update.id));
        }
        Ok(())
    }

    fn delete(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM todos WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn try_acquire_cycle_lease(&self, holder: &str, now_ms: i64, ttl_ms: i64) -> RepoResult<bool> {
        // The upsert only overwrites an expired lease or our own.
        let changed = self.conn()?.execute(
            "INSERT INTO cycle_lease (id, holder, expires_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
             WHERE cycle_lease.expires_at <= ?3 OR cycle_lease.holder = excluded.holder;",
            params![holder, now_ms.saturating_add(ttl_ms), now_ms],
        )?;
        Ok(changed > 0)
    }

    fn release_cycle_lease(&self, holder: &str) -> RepoResult<()> {
        self.conn()?
            .execute("DELETE FROM cycle_lease WHERE holder = ?1;", [holder])?;
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = column(row, "id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid id value `{id_text}` in todos.id")))?;

    let task = Task {
        id,
        title: column(row, "title")?,
        description: column(row, "description")?,
        date_created: column(row, "date_created")?,
        date_due: column(row, "date_due")?,
        notification_sent_today: parse_flag(row, NotificationFlag::NotificationSentToday)?,
        notification_sent_tomorrow: parse_flag(row, NotificationFlag::NotificationSentTomorrow)?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_flag(row: &Row<'_>, flag: NotificationFlag) -> RepoResult<bool> {
    match column::<i64>(row, flag.column())? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {} value `{other}` in todos.{}",
            flag,
            flag.column()
        ))),
    }
}

/// Column read where a type mismatch is bad row data, not a store failure.
fn column<T: FromSql>(row: &Row<'_>, name: &str) -> RepoResult<T> {
    row.get(name)
        .map_err(|err| RepoError::InvalidData(format!("unreadable todos.{name}: {err}")))
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
