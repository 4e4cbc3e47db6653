//! Console input shared between the interactive menu and snooze prompts.
//!
//! One OS thread reads stdin for the lifetime of the process
//! ([`spawn_stdin_reader`]). Its lines go through a [`LineRouter`], which
//! hands each line either to the snooze prompt currently waiting for an
//! answer or, when nobody is waiting, to the menu.
//!
//! A waiting prompt is a `oneshot` sender parked in the router. The prompt
//! side races the receiver against `tokio::time::timeout`; whichever side
//! loses is cleaned up by a drop guard, so a line typed after the window
//! closed flows to the menu instead of a dead prompt.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::input::{InputSource, LineResponse};

/// Menu-side buffer. The menu reads continuously, so this rarely fills.
const MENU_CHANNEL_CAPACITY: usize = 64;

/// Start the process-wide stdin reader thread.
///
/// Blocking reads run on a dedicated OS thread so they never stall Tokio.
/// The thread ends at EOF, on a read error, or once the receiver is dropped
/// and another line arrives.
pub fn spawn_stdin_reader() -> std::io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let line = line.trim_end_matches('\r').to_string();
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read error: {e}");
                        break;
                    }
                }
            }
            debug!("stdin reader exited");
        })?;
    Ok(rx)
}

#[derive(Default)]
struct Slot {
    /// Generation counter so a finished request only clears its own waiter.
    next_ticket: u64,
    waiter: Option<(u64, oneshot::Sender<String>)>,
    /// Set once the line source is exhausted.
    closed: bool,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dispatches console lines between a pending prompt and the menu.
pub struct LineRouter {
    slot: Arc<Mutex<Slot>>,
    prompt_out: Mutex<Box<dyn Write + Send>>,
}

impl LineRouter {
    /// Start routing lines from `source`.
    ///
    /// Returns the router (used as the negotiation [`InputSource`]) and the
    /// receiver the menu reads its lines from. The menu receiver closes when
    /// `source` is exhausted. Must be called inside a Tokio runtime.
    pub fn spawn(
        source: mpsc::UnboundedReceiver<String>,
        prompt_out: Box<dyn Write + Send>,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (menu_tx, menu_rx) = mpsc::channel(MENU_CHANNEL_CAPACITY);
        let slot = Arc::new(Mutex::new(Slot::default()));
        tokio::spawn(dispatch(source, Arc::clone(&slot), menu_tx));
        let router = Arc::new(Self {
            slot,
            prompt_out: Mutex::new(prompt_out),
        });
        (router, menu_rx)
    }

    /// `true` while a prompt is waiting for its answer.
    pub fn is_waiting(&self) -> bool {
        lock(&self.slot).waiter.is_some()
    }

    fn show_prompt(&self, prompt: &str) {
        let mut out = self
            .prompt_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = write!(out, "\n{prompt}").and_then(|_| out.flush()) {
            warn!("failed to write prompt: {e}");
        }
    }
}

async fn dispatch(
    mut source: mpsc::UnboundedReceiver<String>,
    slot: Arc<Mutex<Slot>>,
    menu_tx: mpsc::Sender<String>,
) {
    while let Some(line) = source.recv().await {
        let waiter = lock(&slot).waiter.take();
        // a prompt that gave up before its answer arrived hands the line on
        let line = match waiter {
            Some((ticket, tx)) => match tx.send(line) {
                Ok(()) => continue,
                Err(line) => {
                    debug!(ticket, "prompt closed before its answer arrived; line goes to menu");
                    line
                }
            },
            None => line,
        };
        if menu_tx.send(line).await.is_err() {
            debug!("menu receiver dropped; stopping line router");
            break;
        }
    }
    // Wake a prompt that is still waiting and refuse future ones.
    let mut guard = lock(&slot);
    guard.closed = true;
    guard.waiter = None;
    debug!("line source exhausted");
}

/// Removes this request's waiter on every exit path: answer, timeout, or the
/// request future being dropped mid-wait.
struct WaiterGuard<'a> {
    slot: &'a Mutex<Slot>,
    ticket: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(self.slot);
        if slot.waiter.as_ref().is_some_and(|(t, _)| *t == self.ticket) {
            slot.waiter = None;
        }
    }
}

#[async_trait]
impl InputSource for LineRouter {
    async fn request_line(&self, prompt: &str, timeout: Duration) -> LineResponse {
        let (rx, ticket) = {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return LineResponse::closed();
            }
            let (tx, rx) = oneshot::channel();
            let ticket = slot.next_ticket;
            slot.next_ticket += 1;
            if slot.waiter.replace((ticket, tx)).is_some() {
                warn!("replaced an unanswered input request");
            }
            (rx, ticket)
        };
        let _guard = WaiterGuard {
            slot: &self.slot,
            ticket,
        };
        self.show_prompt(prompt);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(line)) => LineResponse::line(line),
            Ok(Err(_)) => LineResponse::closed(),
            Err(_) => {
                debug!(ticket, ?timeout, "input request timed out");
                LineResponse::timed_out()
            }
        }
    }
}
