use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::time::format_deadline;

/// Stable task identifier. Assigned once by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(TaskId)
    }
}

/// A named notification condition based on time remaining until the deadline.
///
/// Variants are declared in ascending time-remaining order so the derived
/// `Ord` gives the order notifications are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdTag {
    /// Between 55 and 60 minutes remain.
    OneHour,
    /// Between 0 and 5 minutes remain.
    FiveMin,
    /// The deadline has passed.
    Overdue,
}

impl ThresholdTag {
    pub const ALL: [ThresholdTag; 3] = [
        ThresholdTag::OneHour,
        ThresholdTag::FiveMin,
        ThresholdTag::Overdue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdTag::OneHour => "one_hour",
            ThresholdTag::FiveMin => "five_min",
            ThresholdTag::Overdue => "overdue",
        }
    }

    /// Human-readable reminder text for `description`.
    pub fn message(self, description: &str) -> String {
        match self {
            ThresholdTag::OneHour => format!("Reminder: Task '{description}' due in 1 hour."),
            ThresholdTag::FiveMin => format!("Almost Due: '{description}' in 5 mins."),
            ThresholdTag::Overdue => format!("OVERDUE: '{description}' is overdue!"),
        }
    }
}

impl fmt::Display for ThresholdTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ThresholdTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "one_hour" => Ok(ThresholdTag::OneHour),
            "five_min" => Ok(ThresholdTag::FiveMin),
            "overdue" => Ok(ThresholdTag::Overdue),
            other => Err(format!("unknown threshold tag: {other}")),
        }
    }
}

/// A single tracked task.
///
/// `deadline` and `notified` are private: the only way to move the deadline
/// is [`Task::set_deadline`], which also clears every notification flag, so
/// no mutation site can leave stale flags behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    deadline: NaiveDateTime,
    pub completed: bool,
    #[serde(default)]
    notified: BTreeSet<ThresholdTag>,
}

impl Task {
    /// A freshly created task: not completed, nothing notified.
    pub fn new(id: TaskId, description: impl Into<String>, deadline: NaiveDateTime) -> Self {
        Self {
            id,
            description: description.into(),
            deadline,
            completed: false,
            notified: BTreeSet::new(),
        }
    }

    /// Rebuild a task from persisted state.
    pub fn restore(
        id: TaskId,
        description: String,
        deadline: NaiveDateTime,
        completed: bool,
        notified: BTreeSet<ThresholdTag>,
    ) -> Self {
        Self {
            id,
            description,
            deadline,
            completed,
            notified,
        }
    }

    pub fn deadline(&self) -> NaiveDateTime {
        self.deadline
    }

    pub fn notified(&self) -> &BTreeSet<ThresholdTag> {
        &self.notified
    }

    pub fn has_fired(&self, tag: ThresholdTag) -> bool {
        self.notified.contains(&tag)
    }

    /// Record that `tag` was emitted for the current deadline.
    /// Returns `false` if it was already recorded.
    pub fn mark_notified(&mut self, tag: ThresholdTag) -> bool {
        self.notified.insert(tag)
    }

    /// Drop a single flag without touching the deadline.
    pub fn clear_notified(&mut self, tag: ThresholdTag) -> bool {
        self.notified.remove(&tag)
    }

    /// Move the deadline. Clears all notification flags, even when the new
    /// value equals the old one.
    pub fn set_deadline(&mut self, deadline: NaiveDateTime) {
        self.deadline = deadline;
        self.notified.clear();
    }

    pub fn status_label(&self) -> &'static str {
        if self.completed {
            "Done"
        } else {
            "Pending"
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} | Due: {} | {}",
            self.id,
            self.description,
            format_deadline(self.deadline),
            self.status_label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn tags_order_by_time_remaining() {
        let mut tags = vec![
            ThresholdTag::Overdue,
            ThresholdTag::OneHour,
            ThresholdTag::FiveMin,
        ];
        tags.sort();
        assert_eq!(tags, ThresholdTag::ALL.to_vec());
    }

    #[test]
    fn tag_string_forms_agree() {
        for tag in ThresholdTag::ALL {
            assert_eq!(tag.as_str().parse::<ThresholdTag>().unwrap(), tag);
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
        }
        assert!("soon".parse::<ThresholdTag>().is_err());
    }

    #[test]
    fn set_deadline_clears_every_flag() {
        let mut task = Task::new(TaskId(1), "write report", at(10, 0));
        for tag in ThresholdTag::ALL {
            assert!(task.mark_notified(tag));
        }
        assert!(!task.mark_notified(ThresholdTag::Overdue));

        task.set_deadline(at(11, 0));
        assert!(task.notified().is_empty());
        assert_eq!(task.deadline(), at(11, 0));
    }

    #[test]
    fn set_deadline_to_same_value_still_clears() {
        let mut task = Task::new(TaskId(1), "x", at(10, 0));
        task.mark_notified(ThresholdTag::OneHour);
        task.set_deadline(at(10, 0));
        assert!(!task.has_fired(ThresholdTag::OneHour));
    }

    #[test]
    fn display_matches_menu_listing() {
        let mut task = Task::new(TaskId(7), "pay rent", at(9, 30));
        assert_eq!(task.to_string(), "7. pay rent | Due: 2030-01-01 09:30 | Pending");
        task.completed = true;
        assert!(task.to_string().ends_with("| Done"));
    }

    #[test]
    fn task_id_parses_with_whitespace() {
        assert_eq!(" 42 ".parse::<TaskId>().unwrap(), TaskId(42));
        assert!("abc".parse::<TaskId>().is_err());
    }
}
