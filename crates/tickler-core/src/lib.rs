//! `tickler-core`: shared vocabulary for the task tracker.
//!
//! Holds the [`Task`] record and its [`ThresholdTag`] flags, the injectable
//! [`Clock`], deadline parsing, configuration and the crate-wide error type.
//! Every other crate in the workspace depends on this one and nothing else
//! from the workspace.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::{Result, TicklerError};
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{Task, TaskId, ThresholdTag};
