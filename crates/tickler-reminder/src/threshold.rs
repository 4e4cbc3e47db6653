use chrono::{NaiveDateTime, TimeDelta};
use tickler_core::{Task, ThresholdTag};

/// Does `remaining` (deadline − now) fall inside the window for `tag`?
///
/// | Tag        | Window                          |
/// |------------|---------------------------------|
/// | `one_hour` | 55 min < remaining ≤ 60 min     |
/// | `five_min` | 0 < remaining ≤ 5 min           |
/// | `overdue`  | remaining ≤ 0                   |
pub fn in_window(tag: ThresholdTag, remaining: TimeDelta) -> bool {
    match tag {
        ThresholdTag::OneHour => {
            remaining > TimeDelta::minutes(55) && remaining <= TimeDelta::minutes(60)
        }
        ThresholdTag::FiveMin => {
            remaining > TimeDelta::zero() && remaining <= TimeDelta::minutes(5)
        }
        ThresholdTag::Overdue => remaining <= TimeDelta::zero(),
    }
}

/// Tags that newly apply to `task` at `now`, in emission order.
///
/// Pure: the caller records a tag with [`Task::mark_notified`] only after the
/// notification went out. Completed tasks never produce anything.
pub fn evaluate(task: &Task, now: NaiveDateTime) -> Vec<ThresholdTag> {
    if task.completed {
        return Vec::new();
    }
    let remaining = task.deadline() - now;
    ThresholdTag::ALL
        .into_iter()
        .filter(|&tag| !task.has_fired(tag) && in_window(tag, remaining))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tickler_core::TaskId;

    fn deadline() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn task() -> Task {
        Task::new(TaskId(1), "ship it", deadline())
    }

    fn before(minutes: i64) -> NaiveDateTime {
        deadline() - TimeDelta::minutes(minutes)
    }

    #[test]
    fn nothing_fires_far_from_the_deadline() {
        assert!(evaluate(&task(), before(180)).is_empty());
        assert!(evaluate(&task(), before(30)).is_empty());
    }

    #[test]
    fn one_hour_window_bounds() {
        assert!(evaluate(&task(), before(61)).is_empty());
        assert_eq!(evaluate(&task(), before(60)), vec![ThresholdTag::OneHour]);
        assert_eq!(evaluate(&task(), before(56)), vec![ThresholdTag::OneHour]);
        assert!(evaluate(&task(), before(55)).is_empty());
    }

    #[test]
    fn five_min_window_bounds() {
        assert!(evaluate(&task(), before(6)).is_empty());
        assert_eq!(evaluate(&task(), before(5)), vec![ThresholdTag::FiveMin]);
        let one_second_left = deadline() - TimeDelta::seconds(1);
        assert_eq!(evaluate(&task(), one_second_left), vec![ThresholdTag::FiveMin]);
    }

    #[test]
    fn overdue_starts_exactly_at_the_deadline() {
        assert_eq!(evaluate(&task(), deadline()), vec![ThresholdTag::Overdue]);
        assert_eq!(
            evaluate(&task(), deadline() + TimeDelta::days(3)),
            vec![ThresholdTag::Overdue]
        );
    }

    #[test]
    fn fired_tags_are_not_reported_again() {
        let mut t = task();
        t.mark_notified(ThresholdTag::FiveMin);
        assert!(evaluate(&t, before(3)).is_empty());
        assert_eq!(evaluate(&t, deadline()), vec![ThresholdTag::Overdue]);
    }

    #[test]
    fn completed_tasks_never_fire() {
        let mut t = task();
        t.completed = true;
        for minutes in [-600, -1, 0, 1, 3, 5, 57, 60] {
            assert!(evaluate(&t, before(minutes)).is_empty(), "at -{minutes}m");
        }
    }

    #[test]
    fn evaluation_does_not_touch_flags() {
        let t = task();
        let _ = evaluate(&t, deadline());
        assert!(t.notified().is_empty());
    }

    #[test]
    fn walking_through_a_window_twice_fires_once() {
        let mut t = task();
        let mut fired = Vec::new();
        for _pass in 0..2 {
            for minutes in [60, 59, 58, 57, 56] {
                for tag in evaluate(&t, before(minutes)) {
                    fired.push(tag);
                    t.mark_notified(tag);
                }
            }
        }
        assert_eq!(fired, vec![ThresholdTag::OneHour]);
    }
}
