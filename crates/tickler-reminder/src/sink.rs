use std::sync::{Mutex, PoisonError};

use tickler_core::{TaskId, ThresholdTag};
use tracing::info;

/// Where reminder and snooze-status messages go.
///
/// Fire-and-forget: implementations swallow their own failures so the
/// engine never has to handle them.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, task_id: TaskId, tag: ThresholdTag, message: &str);
}

/// Prints to stdout on its own line, so it stands out from a half-typed
/// menu answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn emit(&self, task_id: TaskId, tag: ThresholdTag, message: &str) {
        info!(task_id = %task_id, tag = %tag, "notification");
        println!("\n{message}");
    }
}

/// One emitted message, as captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task_id: TaskId,
    pub tag: ThresholdTag,
    pub message: String,
}

/// Keeps every message in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tags emitted for `task_id`, in order.
    pub fn tags_for(&self, task_id: TaskId) -> Vec<ThresholdTag> {
        self.events()
            .into_iter()
            .filter(|n| n.task_id == task_id)
            .map(|n| n.tag)
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, task_id: TaskId, tag: ThresholdTag, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notification {
                task_id,
                tag,
                message: message.to_string(),
            });
    }
}
