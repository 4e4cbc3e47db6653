use thiserror::Error;

use tickler_core::TaskId;
use tickler_store::StoreError;

/// Errors that can occur within the reminder subsystem.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// A single store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store could not produce a task snapshot for too many ticks in a
    /// row. Fatal for the engine.
    #[error("task store unavailable after {attempts} consecutive failed snapshots: {source}")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The task disappeared between being picked up and being written back.
    #[error("task not found: {id}")]
    TaskNotFound { id: TaskId },
}

pub type Result<T> = std::result::Result<T, ReminderError>;
