//! `tickler-reminder`: deadline reminders and snooze negotiation.
//!
//! [`ReminderEngine`] wakes on a fixed interval, runs every open task through
//! the [`threshold`] evaluator and emits each newly reached reminder exactly
//! once through a [`NotificationSink`]. A task that has become overdue is
//! handed to the [`SnoozeNegotiator`], which asks the operator for a new
//! deadline through an [`InputSource`] and falls back to an automatic snooze
//! when the answer is missing or unusable.
//!
//! On a console the [`LineRouter`] is the input source: it shares the single
//! stdin reader with the interactive menu.

pub mod console;
pub mod engine;
pub mod error;
pub mod input;
pub mod negotiator;
pub mod settings;
pub mod sink;
pub mod threshold;

pub use console::{spawn_stdin_reader, LineRouter};
pub use engine::{EngineState, ReminderEngine, TickReport};
pub use error::{ReminderError, Result};
pub use input::{InputSource, LineResponse, ScriptedInput};
pub use negotiator::{Negotiation, NegotiationOutcome, SnoozeNegotiator};
pub use settings::ReminderSettings;
pub use sink::{ConsoleSink, Notification, NotificationSink, RecordingSink};
