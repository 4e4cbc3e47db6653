use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use tickler_core::{Task, TaskId};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::store::TaskStore;

/// Process-local store; contents vanish on exit.
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: i64,
    tasks: BTreeMap<TaskId, Task>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl TaskStore for MemoryTaskStore {
    fn list_open(&self) -> Result<Vec<Task>> {
        let inner = self.lock()?;
        let mut open: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| !t.completed)
            .cloned()
            .collect();
        open.sort_by_key(|t| (t.deadline(), t.id));
        Ok(open)
    }

    fn list_all(&self) -> Result<Vec<Task>> {
        Ok(self.lock()?.tasks.values().cloned().collect())
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.lock()?.tasks.get(&id).cloned())
    }

    fn insert(&self, description: &str, deadline: NaiveDateTime) -> Result<Task> {
        let mut inner = self.lock()?;
        inner.last_id += 1;
        let task = Task::new(TaskId(inner.last_id), description, deadline);
        inner.tasks.insert(task.id, task.clone());
        info!(task_id = %task.id, "task added");
        Ok(task)
    }

    fn update(&self, task: &Task) -> Result<()> {
        let mut inner = self.lock()?;
        match inner.tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { id: task.id }),
        }
    }

    fn delete(&self, id: TaskId) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.tasks.remove(&id).is_none() {
            return Err(StoreError::NotFound { id });
        }
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    fn modify(&self, id: TaskId, f: &mut dyn FnMut(&mut Task)) -> Result<Option<Task>> {
        let mut inner = self.lock()?;
        let Some(slot) = inner.tasks.get_mut(&id) else {
            return Ok(None);
        };
        f(slot);
        slot.id = id;
        Ok(Some(slot.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tickler_core::ThresholdTag;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn ids_keep_climbing_after_delete() {
        let store = MemoryTaskStore::new();
        let a = store.insert("a", at(10)).unwrap();
        store.delete(a.id).unwrap();
        let b = store.insert("b", at(10)).unwrap();
        assert_eq!(a.id, TaskId(1));
        assert_eq!(b.id, TaskId(2));
    }

    #[test]
    fn list_open_orders_by_deadline() {
        let store = MemoryTaskStore::new();
        let late = store.insert("late", at(12)).unwrap();
        let early = store.insert("early", at(9)).unwrap();
        store
            .modify(late.id, &mut |t| t.completed = true)
            .unwrap();
        let third = store.insert("third", at(11)).unwrap();

        let open: Vec<TaskId> = store.list_open().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(open, vec![early.id, third.id]);
    }

    #[test]
    fn modify_returns_the_persisted_record() {
        let store = MemoryTaskStore::new();
        let task = store.insert("x", at(10)).unwrap();
        let out = store
            .modify(task.id, &mut |t| {
                t.mark_notified(ThresholdTag::FiveMin);
            })
            .unwrap()
            .unwrap();
        assert!(out.has_fired(ThresholdTag::FiveMin));
        assert_eq!(store.get(task.id).unwrap().unwrap(), out);
        assert!(store.modify(TaskId(42), &mut |_| {}).unwrap().is_none());
    }

    #[test]
    fn update_of_missing_task_is_not_found() {
        let store = MemoryTaskStore::new();
        let ghost = Task::new(TaskId(3), "ghost", at(10));
        assert!(matches!(
            store.update(&ghost),
            Err(StoreError::NotFound { .. })
        ));
    }
}
