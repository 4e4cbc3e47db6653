use chrono::NaiveDateTime;
use tickler_core::{Task, TaskId};

use crate::error::Result;

/// Read/write access to the set of tasks.
///
/// Shared between the interactive session and the reminder engine as an
/// `Arc<dyn TaskStore>`. Implementations serialise all access behind one
/// lock, and every read-modify-write must go through [`TaskStore::modify`]
/// so that neither context can overwrite a change it never saw.
pub trait TaskStore: Send + Sync {
    /// Open (not completed) tasks, earliest deadline first.
    fn list_open(&self) -> Result<Vec<Task>>;

    /// Every task, lowest id first.
    fn list_all(&self) -> Result<Vec<Task>>;

    fn get(&self, id: TaskId) -> Result<Option<Task>>;

    /// Create a task with a fresh id, not completed and with no flags set.
    fn insert(&self, description: &str, deadline: NaiveDateTime) -> Result<Task>;

    /// Overwrite the stored record with `task`. `NotFound` if it is gone.
    fn update(&self, task: &Task) -> Result<()>;

    /// Remove a task. `NotFound` if there was nothing to remove.
    fn delete(&self, id: TaskId) -> Result<()>;

    /// Atomically find, mutate and persist a task.
    ///
    /// The store lock is held for the whole sequence. Returns the record as
    /// persisted, or `None` if no task has `id` (in which case `f` is not
    /// called). `f` cannot change the task's id.
    fn modify(&self, id: TaskId, f: &mut dyn FnMut(&mut Task)) -> Result<Option<Task>>;
}
