//! The numbered console menu: add, view, update and delete tasks.

use std::io::Write;
use std::sync::Arc;

use tickler_core::time::parse_future_deadline;
use tickler_core::{Clock, TaskId};
use tickler_store::{StoreError, TaskStore};
use tokio::sync::mpsc;
use tracing::{info, warn};

const MENU: &str = "\n=== Task Manager ===\n\
                    1. Add Task\n\
                    2. View Tasks\n\
                    3. Update Task\n\
                    4. Delete Task\n\
                    5. Exit";

enum Flow {
    Continue,
    Exit,
}

/// Menu loop over lines from the console router.
///
/// Lines arrive on `lines`; the loop ends on "5", or once the channel closes.
pub struct Menu<W: Write> {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    lines: mpsc::Receiver<String>,
    out: W,
}

impl<W: Write> Menu<W> {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        lines: mpsc::Receiver<String>,
        out: W,
    ) -> Self {
        Self {
            store,
            clock,
            lines,
            out,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            writeln!(self.out, "{MENU}")?;
            let Some(choice) = self.ask("Choose: ").await? else {
                break;
            };
            let flow = match choice.trim() {
                "1" => self.add().await?,
                "2" => self.view()?,
                "3" => self.update().await?,
                "4" => self.delete().await?,
                "5" => Flow::Exit,
                _ => {
                    writeln!(self.out, "Invalid choice.")?;
                    Flow::Continue
                }
            };
            if let Flow::Exit = flow {
                break;
            }
        }
        info!("menu closed");
        Ok(())
    }

    /// Print `prompt` and wait for the next line. `None` once input ends.
    async fn ask(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        Ok(self.lines.recv().await)
    }

    fn report(&mut self, err: StoreError) -> anyhow::Result<Flow> {
        warn!("store error in menu: {err}");
        writeln!(self.out, "Error: {err}")?;
        Ok(Flow::Continue)
    }

    async fn add(&mut self) -> anyhow::Result<Flow> {
        let Some(description) = self.ask("Description: ").await? else {
            return Ok(Flow::Exit);
        };
        let Some(raw) = self.ask("Deadline (YYYY-MM-DD HH:MM): ").await? else {
            return Ok(Flow::Exit);
        };
        let Ok(deadline) = parse_future_deadline(&raw, self.clock.now()) else {
            writeln!(self.out, "Invalid or past deadline.")?;
            return Ok(Flow::Continue);
        };
        match self.store.insert(description.trim(), deadline) {
            Ok(_) => writeln!(self.out, "Task added.")?,
            Err(e) => return self.report(e),
        }
        Ok(Flow::Continue)
    }

    fn view(&mut self) -> anyhow::Result<Flow> {
        let tasks = match self.store.list_all() {
            Ok(tasks) => tasks,
            Err(e) => return self.report(e),
        };
        if tasks.is_empty() {
            writeln!(self.out, "No tasks yet.")?;
        }
        for task in tasks {
            writeln!(self.out, "{task}")?;
        }
        Ok(Flow::Continue)
    }

    async fn read_id(&mut self, prompt: &str) -> anyhow::Result<Option<Option<TaskId>>> {
        let Some(raw) = self.ask(prompt).await? else {
            return Ok(None);
        };
        Ok(Some(raw.parse::<TaskId>().ok()))
    }

    async fn update(&mut self) -> anyhow::Result<Flow> {
        self.view()?;
        let Some(id) = self.read_id("Task ID to update: ").await? else {
            return Ok(Flow::Exit);
        };
        let Some(id) = id else {
            writeln!(self.out, "Invalid ID.")?;
            return Ok(Flow::Continue);
        };
        match self.store.get(id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                writeln!(self.out, "Task not found.")?;
                return Ok(Flow::Continue);
            }
            Err(e) => return self.report(e),
        }

        let Some(description) = self.ask("New description (blank to skip): ").await? else {
            return Ok(Flow::Exit);
        };
        let Some(raw_deadline) = self.ask("New deadline (YYYY-MM-DD HH:MM, blank to skip): ").await? else {
            return Ok(Flow::Exit);
        };
        let Some(raw_completed) = self.ask("Mark as completed? (y/n): ").await? else {
            return Ok(Flow::Exit);
        };

        let description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
        let deadline = parse_future_deadline(&raw_deadline, self.clock.now()).ok();
        if deadline.is_none() && !raw_deadline.trim().is_empty() {
            writeln!(self.out, "Invalid or past deadline; keeping the current one.")?;
        }
        let completed = match raw_completed.trim().to_ascii_lowercase().as_str() {
            "y" => Some(true),
            "n" => Some(false),
            _ => None,
        };

        let updated = self.store.modify(id, &mut |t| {
            if let Some(d) = &description {
                t.description = d.clone();
            }
            if let Some(dl) = deadline {
                t.set_deadline(dl);
            }
            if let Some(c) = completed {
                t.completed = c;
            }
        });
        match updated {
            Ok(Some(task)) => {
                info!(task_id = %task.id, "task updated");
                writeln!(self.out, "Task updated.")?;
            }
            Ok(None) => writeln!(self.out, "Task not found.")?,
            Err(e) => return self.report(e),
        }
        Ok(Flow::Continue)
    }

    async fn delete(&mut self) -> anyhow::Result<Flow> {
        self.view()?;
        let Some(id) = self.read_id("Task ID to delete: ").await? else {
            return Ok(Flow::Exit);
        };
        let Some(id) = id else {
            writeln!(self.out, "Invalid ID.")?;
            return Ok(Flow::Continue);
        };
        match self.store.delete(id) {
            Ok(()) => writeln!(self.out, "Task deleted.")?,
            Err(StoreError::NotFound { .. }) => writeln!(self.out, "Task not found.")?,
            Err(e) => return self.report(e),
        }
        Ok(Flow::Continue)
    }
}
