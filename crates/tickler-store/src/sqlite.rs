use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tickler_core::time::{from_storage, to_storage};
use tickler_core::{Task, TaskId, ThresholdTag};
use tracing::{debug, info, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::store::TaskStore;

const SELECT_COLUMNS: &str = "SELECT id, description, deadline, completed, notified FROM tasks";

/// SQLite-backed task store.
///
/// Wraps a single connection in a `Mutex`; every write is committed before
/// the lock is released, so there is nothing to flush.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Take ownership of `conn` and make sure the schema exists.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path` in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = %path.as_ref().display(), "task database opened");
        Self::new(conn)
    }

    /// A private database that lives as long as the store.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_list(&self, sql: &str) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows: Vec<TaskRow> = stmt
            .query_map([], TaskRow::read)?
            .collect::<rusqlite::Result<_>>()?;

        // A single undecodable row should not hide every other task.
        let tasks = rows
            .into_iter()
            .filter_map(|row| match row.into_task() {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(error = %e, "skipping corrupt task row");
                    None
                }
            })
            .collect();
        Ok(tasks)
    }
}

impl TaskStore for SqliteTaskStore {
    fn list_open(&self) -> Result<Vec<Task>> {
        self.query_list(&format!(
            "{SELECT_COLUMNS} WHERE completed = 0 ORDER BY deadline, id"
        ))
    }

    fn list_all(&self) -> Result<Vec<Task>> {
        self.query_list(&format!("{SELECT_COLUMNS} ORDER BY id"))
    }

    #[instrument(skip(self), fields(task_id = %id))]
    fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let conn = self.lock()?;
        fetch(&conn, id)
    }

    #[instrument(skip(self, deadline))]
    fn insert(&self, description: &str, deadline: NaiveDateTime) -> Result<Task> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO tasks (description, deadline, completed, notified, created_at, updated_at)
             VALUES (?1, ?2, 0, '[]', ?3, ?3)",
            rusqlite::params![description, to_storage(deadline), now],
        )?;
        let id = TaskId(conn.last_insert_rowid());
        info!(task_id = %id, "task added");
        Ok(Task::new(id, description, deadline))
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    fn update(&self, task: &Task) -> Result<()> {
        let conn = self.lock()?;
        write(&conn, task.id, task)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    fn delete(&self, id: TaskId) -> Result<()> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM tasks WHERE id = ?1", [id.get()])?;
        if n == 0 {
            return Err(StoreError::NotFound { id });
        }
        info!("task deleted");
        Ok(())
    }

    #[instrument(skip(self, f), fields(task_id = %id))]
    fn modify(&self, id: TaskId, f: &mut dyn FnMut(&mut Task)) -> Result<Option<Task>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some(mut task) = fetch(&tx, id)? else {
            debug!("modify: task not found");
            return Ok(None);
        };
        f(&mut task);
        task.id = id;
        write(&tx, id, &task)?;
        tx.commit()?;
        Ok(Some(task))
    }
}

fn fetch(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    let row = conn
        .query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            [id.get()],
            TaskRow::read,
        )
        .optional()?;
    row.map(TaskRow::into_task).transpose()
}

fn write(conn: &Connection, id: TaskId, task: &Task) -> Result<()> {
    let notified = serde_json::to_string(task.notified())?;
    let n = conn.execute(
        "UPDATE tasks SET description = ?1, deadline = ?2, completed = ?3,
                          notified = ?4, updated_at = ?5
         WHERE id = ?6",
        rusqlite::params![
            task.description,
            to_storage(task.deadline()),
            task.completed,
            notified,
            Utc::now().to_rfc3339(),
            id.get(),
        ],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}

/// Raw column values, decoded into a [`Task`] outside the rusqlite callback
/// so decode failures carry the task id.
struct TaskRow {
    id: i64,
    description: String,
    deadline: String,
    completed: bool,
    notified: String,
}

impl TaskRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            description: row.get(1)?,
            deadline: row.get(2)?,
            completed: row.get(3)?,
            notified: row.get(4)?,
        })
    }

    fn into_task(self) -> Result<Task> {
        let id = TaskId(self.id);
        let deadline = from_storage(&self.deadline).map_err(|e| StoreError::Corrupt {
            id,
            reason: e.to_string(),
        })?;
        let notified: BTreeSet<ThresholdTag> =
            serde_json::from_str(&self.notified).map_err(|e| StoreError::Corrupt {
                id,
                reason: format!("notified: {e}"),
            })?;
        Ok(Task::restore(
            id,
            self.description,
            deadline,
            self.completed,
            notified,
        ))
    }
}
