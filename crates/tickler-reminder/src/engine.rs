use std::sync::Arc;

use tickler_core::{Clock, Task, TaskId, ThresholdTag};
use tickler_store::TaskStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{ReminderError, Result};
use crate::input::InputSource;
use crate::negotiator::{Negotiation, SnoozeNegotiator};
use crate::settings::ReminderSettings;
use crate::sink::NotificationSink;
use crate::threshold;

/// What the engine is doing right now, published on a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Scanning,
    Negotiating(TaskId),
}

/// Summary of a single tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Open tasks in the snapshot.
    pub scanned: usize,
    /// Reminder messages emitted (snooze status messages not included).
    pub notifications: usize,
    pub negotiations: Vec<Negotiation>,
    /// Tasks left alone for this tick: superseded by a concurrent update or
    /// hit by a per-task store failure.
    pub skipped: usize,
    /// The tick stopped early because shutdown was requested.
    pub interrupted: bool,
}

enum Flow {
    Continue,
    Stop,
}

/// Periodic deadline scanner: emits threshold reminders and runs a snooze
/// negotiation for every task that becomes overdue.
pub struct ReminderEngine {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    negotiator: SnoozeNegotiator,
    settings: ReminderSettings,
    state: watch::Sender<EngineState>,
}

impl ReminderEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        input: Arc<dyn InputSource>,
        settings: ReminderSettings,
    ) -> Self {
        let negotiator = SnoozeNegotiator::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&sink),
            input,
            &settings,
        );
        let (state, _) = watch::channel(EngineState::Idle);
        Self {
            store,
            clock,
            sink,
            negotiator,
            settings,
            state,
        }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Main loop. Ticks once right away, then sleeps `tick_interval` after
    /// each tick completes, until `shutdown` broadcasts `true` or its sender
    /// is dropped.
    ///
    /// Returns [`ReminderError::StoreUnavailable`] once `max_store_failures`
    /// snapshots in a row have failed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(interval = ?self.settings.tick_interval, "reminder engine started");
        if let Err(e) = self.recover_interrupted_negotiations() {
            error!("startup recovery failed: {e}");
        }

        let mut failures: u32 = 0;

        loop {
            if is_shutdown(&shutdown) {
                break;
            }
            match self.tick(&mut shutdown).await {
                Ok(report) => {
                    failures = 0;
                    debug!(
                        scanned = report.scanned,
                        notifications = report.notifications,
                        negotiations = report.negotiations.len(),
                        skipped = report.skipped,
                        "tick complete"
                    );
                    if report.interrupted {
                        break;
                    }
                }
                Err(ReminderError::Store(source)) => {
                    failures += 1;
                    warn!(
                        attempt = failures,
                        max = self.settings.max_store_failures,
                        "task snapshot failed: {source}"
                    );
                    if failures >= self.settings.max_store_failures {
                        error!(attempts = failures, "task store unavailable, stopping reminder engine");
                        return Err(ReminderError::StoreUnavailable {
                            attempts: failures,
                            source,
                        });
                    }
                }
                Err(e) => error!("reminder tick error: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.tick_interval) => {}
                _ = shutdown_signalled(&mut shutdown) => break,
            }
        }

        info!("reminder engine shutting down");
        Ok(())
    }

    /// Re-arm tasks whose negotiation never finished.
    ///
    /// A resolved negotiation always leaves a future deadline with no flags,
    /// so an open task that is flagged `overdue` while its deadline has
    /// passed was interrupted. Clearing the flag makes the next tick
    /// negotiate it again. Returns how many tasks were re-armed.
    pub fn recover_interrupted_negotiations(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut recovered = 0;
        for task in self.store.list_open()? {
            if !task.has_fired(ThresholdTag::Overdue) || task.deadline() > now {
                continue;
            }
            let mut cleared = false;
            self.store.modify(task.id, &mut |t| {
                if !t.completed && t.deadline() <= now {
                    cleared = t.clear_notified(ThresholdTag::Overdue);
                }
            })?;
            if cleared {
                recovered += 1;
            }
        }
        if recovered > 0 {
            warn!(count = recovered, "overdue tasks re-armed on startup");
        }
        Ok(recovered)
    }

    /// Scan every open task once.
    ///
    /// Only a failed snapshot is an error; per-task failures are logged and
    /// counted in [`TickReport::skipped`].
    pub async fn tick(&self, shutdown: &mut watch::Receiver<bool>) -> Result<TickReport> {
        self.state.send_replace(EngineState::Scanning);
        let result = self.scan(shutdown).await;
        self.state.send_replace(EngineState::Idle);
        result
    }

    async fn scan(&self, shutdown: &mut watch::Receiver<bool>) -> Result<TickReport> {
        let snapshot = self.store.list_open()?;
        let mut report = TickReport {
            scanned: snapshot.len(),
            ..TickReport::default()
        };

        for listed in snapshot {
            if is_shutdown(shutdown) {
                report.interrupted = true;
                break;
            }
            // Re-read: an earlier negotiation may have taken a while.
            let task = match self.store.get(listed.id) {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    warn!(task_id = %listed.id, "failed to read task: {e}");
                    report.skipped += 1;
                    continue;
                }
            };
            if let Flow::Stop = self.process(task, shutdown, &mut report).await {
                report.interrupted = true;
                break;
            }
        }
        Ok(report)
    }

    async fn process(
        &self,
        task: Task,
        shutdown: &mut watch::Receiver<bool>,
        report: &mut TickReport,
    ) -> Flow {
        let now = self.clock.now();
        let evaluated = task.deadline();

        for tag in threshold::evaluate(&task, now) {
            self.sink
                .emit(task.id, tag, &tag.message(&task.description));
            report.notifications += 1;

            let mut applied = false;
            let marked = self.store.modify(task.id, &mut |t| {
                if !t.completed && t.deadline() == evaluated {
                    t.mark_notified(tag);
                    applied = true;
                }
            });
            match marked {
                Ok(Some(_)) if applied => {}
                Ok(_) => {
                    debug!(task_id = %task.id, tag = %tag, "task changed since evaluation, skipping");
                    report.skipped += 1;
                    return Flow::Continue;
                }
                Err(e) => {
                    warn!(task_id = %task.id, tag = %tag, "failed to record notification: {e}");
                    report.skipped += 1;
                    return Flow::Continue;
                }
            }

            if tag == ThresholdTag::Overdue {
                return self.negotiate(&task, shutdown, report).await;
            }
        }
        Flow::Continue
    }

    async fn negotiate(
        &self,
        task: &Task,
        shutdown: &mut watch::Receiver<bool>,
        report: &mut TickReport,
    ) -> Flow {
        self.state.send_replace(EngineState::Negotiating(task.id));
        let outcome = tokio::select! {
            res = self.negotiator.negotiate(task) => Some(res),
            _ = shutdown_signalled(shutdown) => None,
        };
        self.state.send_replace(EngineState::Scanning);

        match outcome {
            None => {
                info!(task_id = %task.id, "negotiation abandoned for shutdown");
                return Flow::Stop;
            }
            Some(Ok(negotiation)) => report.negotiations.push(negotiation),
            Some(Err(ReminderError::TaskNotFound { id })) => {
                info!(task_id = %id, "task deleted during negotiation");
            }
            Some(Err(e)) => {
                warn!(task_id = %task.id, "negotiation failed: {e}");
                report.skipped += 1;
                self.rearm(task.id);
            }
        }
        Flow::Continue
    }

    /// Clear the overdue flag so the next tick tries again.
    fn rearm(&self, id: TaskId) {
        if let Err(e) = self.store.modify(id, &mut |t| {
            t.clear_notified(ThresholdTag::Overdue);
        }) {
            warn!(task_id = %id, "failed to re-arm task: {e}");
        }
    }
}

fn is_shutdown(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow() || rx.has_changed().is_err()
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
