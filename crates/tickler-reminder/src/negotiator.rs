use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use tickler_core::config::DEFAULT_AUTO_SNOOZE_MINUTES;
use tickler_core::time::{format_deadline, parse_future_deadline};
use tickler_core::{Clock, Task, TaskId, ThresholdTag};
use tickler_store::TaskStore;
use tracing::{info, instrument};

use crate::error::{ReminderError, Result};
use crate::input::{InputSource, LineResponse};
use crate::settings::ReminderSettings;
use crate::sink::NotificationSink;

/// How a snooze exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// The operator entered a valid future deadline.
    Accepted,
    /// The operator answered with something unusable.
    Rejected { input: String },
    /// Nothing arrived before the window closed.
    TimedOut,
}

/// Result of one completed negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    pub task_id: TaskId,
    pub outcome: NegotiationOutcome,
    /// The deadline now stored for the task. Always after the moment the
    /// negotiation resolved.
    pub deadline: NaiveDateTime,
}

/// Asks the operator for a new deadline for an overdue task and persists it.
pub struct SnoozeNegotiator {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    input: Arc<dyn InputSource>,
    timeout: Duration,
    auto_snooze: TimeDelta,
}

impl SnoozeNegotiator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        input: Arc<dyn InputSource>,
        settings: &ReminderSettings,
    ) -> Self {
        Self {
            store,
            clock,
            sink,
            input,
            timeout: settings.negotiation_timeout,
            // a fallback must land strictly after `now`
            auto_snooze: if settings.auto_snooze > TimeDelta::zero() {
                settings.auto_snooze
            } else {
                TimeDelta::minutes(DEFAULT_AUTO_SNOOZE_MINUTES as i64)
            },
        }
    }

    pub fn prompt_for(&self, task: &Task) -> String {
        format!(
            "Snooze '{}'? Enter new deadline (YYYY-MM-DD HH:MM) or wait {}s for auto-snooze: ",
            task.description,
            self.timeout.as_secs()
        )
    }

    /// Decide the outcome and the deadline to store for `response` at `now`.
    pub fn resolve(
        &self,
        response: &LineResponse,
        now: NaiveDateTime,
    ) -> (NegotiationOutcome, NaiveDateTime) {
        let fallback = now
            .checked_add_signed(self.auto_snooze)
            .unwrap_or(NaiveDateTime::MAX);
        match response.text.as_deref() {
            None => (NegotiationOutcome::TimedOut, fallback),
            Some(text) => match parse_future_deadline(text, now) {
                Ok(deadline) => (NegotiationOutcome::Accepted, deadline),
                Err(_) => (
                    NegotiationOutcome::Rejected {
                        input: text.trim().to_string(),
                    },
                    fallback,
                ),
            },
        }
    }

    /// Run the exchange for `task`, which must already be flagged overdue.
    ///
    /// Only the deadline (and with it the notification flags) is written;
    /// description and completion are kept as currently stored.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn negotiate(&self, task: &Task) -> Result<Negotiation> {
        let prompt = self.prompt_for(task);
        let response = self.input.request_line(&prompt, self.timeout).await;

        let now = self.clock.now();
        let (outcome, deadline) = self.resolve(&response, now);

        let stored = self
            .store
            .modify(task.id, &mut |t| t.set_deadline(deadline))?
            .ok_or(ReminderError::TaskNotFound { id: task.id })?;

        let when = format_deadline(deadline);
        let message = match &outcome {
            NegotiationOutcome::Accepted => {
                format!("'{}' is snoozed until {when}.", stored.description)
            }
            NegotiationOutcome::Rejected { input } => format!(
                "Invalid deadline '{input}'. '{}' auto-snoozed to {when}.",
                stored.description
            ),
            NegotiationOutcome::TimedOut => {
                format!("No response; '{}' auto-snoozed to {when}.", stored.description)
            }
        };
        self.sink.emit(task.id, ThresholdTag::Overdue, &message);
        info!(outcome = ?outcome, deadline = %when, "task snoozed");

        Ok(Negotiation {
            task_id: task.id,
            outcome,
            deadline,
        })
    }
}
