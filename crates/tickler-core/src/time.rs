//! Wall-clock helpers: the injectable [`Clock`], deadline parsing and the
//! display/storage formats.
//!
//! All timestamps are local wall-clock time (`NaiveDateTime`). Timezone
//! handling beyond what the machine's clock provides is out of scope.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{Result, TicklerError};

/// Format used when showing deadlines to the operator.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Lossless format used for persisted deadlines.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Input formats accepted for a deadline, tried in order.
const INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Source of "now". Everything that compares against the current time takes
/// one of these so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse operator input into a deadline.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]`, the same with a `T` separator, a bare
/// `YYYY-MM-DD` (midnight), and RFC 3339 (converted to local time).
pub fn parse_deadline(input: &str) -> Result<NaiveDateTime> {
    let s = input.trim();
    let invalid = || TicklerError::InvalidDeadline {
        input: input.to_string(),
    };
    if s.is_empty() {
        return Err(invalid());
    }

    for fmt in INPUT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).ok_or_else(invalid);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .map_err(|_| invalid())
}

/// Parse a deadline and require it to be strictly after `now`.
pub fn parse_future_deadline(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let deadline = parse_deadline(input)?;
    if deadline > now {
        Ok(deadline)
    } else {
        Err(TicklerError::InvalidDeadline {
            input: input.to_string(),
        })
    }
}

pub fn format_deadline(deadline: NaiveDateTime) -> String {
    deadline.format(DISPLAY_FORMAT).to_string()
}

pub fn to_storage(deadline: NaiveDateTime) -> String {
    deadline.format(STORAGE_FORMAT).to_string()
}

pub fn from_storage(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, STORAGE_FORMAT).map_err(|_| TicklerError::InvalidDeadline {
        input: s.to_string(),
    })
}
