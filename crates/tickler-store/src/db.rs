use rusqlite::Connection;

use crate::error::Result;

/// Initialise the task schema in `conn`.
///
/// Idempotent. `AUTOINCREMENT` guarantees an id is never handed out twice,
/// even after the highest-numbered task is deleted.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT    NOT NULL,
            deadline    TEXT    NOT NULL,   -- local wall clock, %Y-%m-%dT%H:%M:%S%.f
            completed   INTEGER NOT NULL DEFAULT 0,
            notified    TEXT    NOT NULL DEFAULT '[]',   -- JSON array of threshold tags
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        );

        -- Scheduler snapshot: SELECT … WHERE completed = 0 ORDER BY deadline
        CREATE INDEX IF NOT EXISTS idx_tasks_open ON tasks (completed, deadline);
        ",
    )?;
    Ok(())
}
