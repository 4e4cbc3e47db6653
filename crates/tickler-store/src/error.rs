use thiserror::Error;

use tickler_core::TaskId;

/// Errors that can occur within a task store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No task with the given ID exists in the store.
    #[error("task not found: {id}")]
    NotFound { id: TaskId },

    /// A persisted row could not be turned back into a task.
    #[error("task {id} is corrupt: {reason}")]
    Corrupt { id: TaskId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
