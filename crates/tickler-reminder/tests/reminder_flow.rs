// End-to-end reminder behaviour against a SQLite store and the console line
// router, with a manual clock and millisecond timeouts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tickler_core::{Clock, ManualClock, Task, TaskId, ThresholdTag};
use tickler_reminder::{
    EngineState, LineRouter, NegotiationOutcome, RecordingSink, ReminderEngine, ReminderError,
    ReminderSettings,
};
use tickler_store::{SqliteTaskStore, StoreError, TaskStore};
use tokio::sync::{mpsc, watch};

fn nine_am() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2029, 6, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn settings(negotiation_timeout: Duration) -> ReminderSettings {
    ReminderSettings {
        tick_interval: Duration::from_millis(10),
        negotiation_timeout,
        auto_snooze: TimeDelta::minutes(60),
        max_store_failures: 3,
    }
}

struct Harness {
    store: Arc<SqliteTaskStore>,
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
    router: Arc<LineRouter>,
    lines: mpsc::UnboundedSender<String>,
    menu: mpsc::Receiver<String>,
    engine: Arc<ReminderEngine>,
}

fn harness(negotiation_timeout: Duration) -> Harness {
    let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(nine_am()));
    let sink = Arc::new(RecordingSink::new());
    let (lines, source) = mpsc::unbounded_channel();
    let (router, menu) = LineRouter::spawn(source, Box::new(std::io::sink()));
    let engine = Arc::new(ReminderEngine::new(
        store.clone(),
        clock.clone(),
        sink.clone(),
        router.clone(),
        settings(negotiation_timeout),
    ));
    Harness {
        store,
        clock,
        sink,
        router,
        lines,
        menu,
        engine,
    }
}

fn overdue_task(store: &SqliteTaskStore, description: &str) -> Task {
    store
        .insert(description, nine_am() - TimeDelta::minutes(2))
        .unwrap()
}

async fn wait_for_prompt(router: &LineRouter) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !router.is_waiting() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("no prompt was shown");
}

#[tokio::test]
async fn typed_deadline_is_adopted_and_flags_reset() {
    let h = harness(Duration::from_secs(5));
    let task = overdue_task(&h.store, "renew passport");
    let (_tx, mut rx) = watch::channel(false);

    let engine = h.engine.clone();
    let tick = tokio::spawn(async move { engine.tick(&mut rx).await });
    wait_for_prompt(&h.router).await;
    h.lines.send("2030-01-01 10:00".into()).unwrap();

    let report = tick.await.unwrap().unwrap();
    assert_eq!(report.negotiations.len(), 1);
    assert_eq!(report.negotiations[0].outcome, NegotiationOutcome::Accepted);

    let stored = h.store.get(task.id).unwrap().unwrap();
    assert_eq!(
        stored.deadline(),
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    );
    assert!(stored.notified().is_empty());
    assert_eq!(
        h.sink.tags_for(task.id),
        vec![ThresholdTag::Overdue, ThresholdTag::Overdue]
    );
}

#[tokio::test]
async fn unparsable_answer_auto_snoozes() {
    let h = harness(Duration::from_secs(5));
    let task = overdue_task(&h.store, "water plants");
    let (_tx, mut rx) = watch::channel(false);

    let engine = h.engine.clone();
    let tick = tokio::spawn(async move { engine.tick(&mut rx).await });
    wait_for_prompt(&h.router).await;
    h.lines.send("not-a-date".into()).unwrap();

    let report = tick.await.unwrap().unwrap();
    assert!(matches!(
        report.negotiations[0].outcome,
        NegotiationOutcome::Rejected { .. }
    ));
    let stored = h.store.get(task.id).unwrap().unwrap();
    assert_eq!(stored.deadline(), nine_am() + TimeDelta::minutes(60));
    assert!(stored.notified().is_empty());
}

#[tokio::test]
async fn silence_times_out_promptly_and_late_line_reaches_menu() {
    let mut h = harness(Duration::from_millis(50));
    let task = overdue_task(&h.store, "reply to landlord");
    let (_tx, mut rx) = watch::channel(false);

    let started = Instant::now();
    let report = h.engine.tick(&mut rx).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.negotiations[0].outcome, NegotiationOutcome::TimedOut);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2), "tick took {elapsed:?}");

    let stored = h.store.get(task.id).unwrap().unwrap();
    assert!(stored.deadline() > h.clock.now());
    assert!(stored.notified().is_empty());

    h.lines.send("2".into()).unwrap();
    let routed = tokio::time::timeout(Duration::from_secs(2), h.menu.recv())
        .await
        .unwrap();
    assert_eq!(routed.as_deref(), Some("2"));
}

#[tokio::test]
async fn menu_edit_during_negotiation_is_not_lost() {
    let h = harness(Duration::from_secs(5));
    let task = overdue_task(&h.store, "book dentist");
    let (_tx, mut rx) = watch::channel(false);
    let mut state = h.engine.state();

    let engine = h.engine.clone();
    let tick = tokio::spawn(async move { engine.tick(&mut rx).await });
    state
        .wait_for(|s| *s == EngineState::Negotiating(task.id))
        .await
        .unwrap();
    wait_for_prompt(&h.router).await;

    h.store
        .modify(task.id, &mut |t| {
            t.completed = true;
            t.description = "book dentist (called)".into();
        })
        .unwrap();
    h.lines.send("2030-01-01 10:00".into()).unwrap();
    tick.await.unwrap().unwrap();

    let stored = h.store.get(task.id).unwrap().unwrap();
    assert!(stored.completed);
    assert_eq!(stored.description, "book dentist (called)");
    assert_eq!(
        stored.deadline(),
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    );
    assert_eq!(*state.borrow(), EngineState::Idle);
}

#[tokio::test]
async fn snoozed_task_reminds_again_on_its_new_schedule() {
    let h = harness(Duration::from_secs(5));
    let task = overdue_task(&h.store, "send invoice");
    let (_tx, mut rx) = watch::channel(false);

    let engine = h.engine.clone();
    let tick = tokio::spawn(async move { engine.tick(&mut rx).await });
    wait_for_prompt(&h.router).await;
    h.lines.send("2029-06-01 11:00".into()).unwrap();
    tick.await.unwrap().unwrap();

    // 58 minutes before the new deadline.
    h.clock.set(nine_am() + TimeDelta::minutes(62));
    let (_tx, mut rx) = watch::channel(false);
    let report = h.engine.tick(&mut rx).await.unwrap();
    assert_eq!(report.notifications, 1);
    assert_eq!(
        h.sink.tags_for(task.id).last(),
        Some(&ThresholdTag::OneHour)
    );
}

#[tokio::test]
async fn shutdown_abandons_negotiation_and_recovery_rearms_it() {
    let h = harness(Duration::from_secs(30));
    let task = overdue_task(&h.store, "return library books");
    let (tx, mut rx) = watch::channel(false);

    let engine = h.engine.clone();
    let tick = tokio::spawn(async move { engine.tick(&mut rx).await });
    wait_for_prompt(&h.router).await;
    tx.send(true).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(2), tick)
        .await
        .expect("tick ignored shutdown")
        .unwrap()
        .unwrap();
    assert!(report.interrupted);
    assert!(report.negotiations.is_empty());
    assert!(!h.router.is_waiting());

    let stored = h.store.get(task.id).unwrap().unwrap();
    assert!(stored.has_fired(ThresholdTag::Overdue));
    assert_eq!(stored.deadline(), task.deadline());

    assert_eq!(h.engine.recover_interrupted_negotiations().unwrap(), 1);
    let stored = h.store.get(task.id).unwrap().unwrap();
    assert!(!stored.has_fired(ThresholdTag::Overdue));
}

/// Fails every operation, counting snapshot attempts.
#[derive(Default)]
struct BrokenStore {
    snapshots: AtomicUsize,
}

impl TaskStore for BrokenStore {
    fn list_open(&self) -> tickler_store::Result<Vec<Task>> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Poisoned)
    }

    fn list_all(&self) -> tickler_store::Result<Vec<Task>> {
        Err(StoreError::Poisoned)
    }

    fn get(&self, _id: TaskId) -> tickler_store::Result<Option<Task>> {
        Err(StoreError::Poisoned)
    }

    fn insert(&self, _description: &str, _deadline: NaiveDateTime) -> tickler_store::Result<Task> {
        Err(StoreError::Poisoned)
    }

    fn update(&self, _task: &Task) -> tickler_store::Result<()> {
        Err(StoreError::Poisoned)
    }

    fn delete(&self, _id: TaskId) -> tickler_store::Result<()> {
        Err(StoreError::Poisoned)
    }

    fn modify(
        &self,
        _id: TaskId,
        _f: &mut dyn FnMut(&mut Task),
    ) -> tickler_store::Result<Option<Task>> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn engine_gives_up_after_consecutive_snapshot_failures() {
    let store = Arc::new(BrokenStore::default());
    let (_lines, source) = mpsc::unbounded_channel::<String>();
    let (router, _menu) = LineRouter::spawn(source, Box::new(std::io::sink()));
    let engine = ReminderEngine::new(
        store.clone(),
        Arc::new(ManualClock::new(nine_am())),
        Arc::new(RecordingSink::new()),
        router,
        settings(Duration::from_millis(20)),
    );
    let (_tx, rx) = watch::channel(false);

    let result = tokio::time::timeout(Duration::from_secs(5), engine.run(rx))
        .await
        .expect("engine kept running against a dead store");

    match result {
        Err(ReminderError::StoreUnavailable { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected StoreUnavailable, got {other:?}"),
    }
    // Startup recovery takes one snapshot before the tick loop.
    assert_eq!(store.snapshots.load(Ordering::SeqCst), 4);
}
