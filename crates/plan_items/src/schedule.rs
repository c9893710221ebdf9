use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use plan_core::expand::expand;

use crate::fields::NoteItem;

/// A renderable occurrence row. `occurrence_id` is `<itemPath>::<index>`, so
/// a rendered bar can be mapped back to its source item and position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledOccurrence {
    pub occurrence_id: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub completed: bool,
}

impl PartialOrd for ScheduledOccurrence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledOccurrence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.occurrence_id.cmp(&other.occurrence_id))
    }
}

/// Expand one item's recurrence over the window and stamp each occurrence
/// with its identity and completion state.
pub fn build_schedule(
    item: &NoteItem,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<ScheduledOccurrence> {
    let rule = item.rule();
    let completions = item.completions();
    expand(&rule, window_start, window_end)
        .into_iter()
        .map(|occurrence| ScheduledOccurrence {
            occurrence_id: format!("{}::{}", item.path, occurrence.index),
            start: occurrence.start,
            end: occurrence.end,
            completed: completions.is_completed(occurrence.start),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn weekly_item() -> NoteItem {
        let fields = json!({
            "repeat_frequency": "WEEKLY",
            "repeat_byday": ["MO"],
            "repeat_completed_dates": ["2025-01-13T18:30:00Z"],
            "date_start_scheduled": "2025-01-06T09:00:00",
            "date_end_scheduled": "2025-01-06T09:30:00",
        });
        NoteItem::with_fields("notes/standup.md", fields.as_object().unwrap().clone())
    }

    #[test]
    fn rows_carry_identity_duration_and_completion() {
        let rows = build_schedule(&weekly_item(), dt(2025, 1, 1, 0, 0), dt(2025, 1, 31, 23, 59));
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].occurrence_id, "notes/standup.md::0");
        assert_eq!(rows[1].occurrence_id, "notes/standup.md::1");
        assert_eq!(rows[0].end, Some(dt(2025, 1, 6, 9, 30)));
        assert!(!rows[0].completed);
        assert!(rows[1].completed, "Jan 13 was checked off");
        assert!(!rows[2].completed);
    }

    #[test]
    fn occurrence_ids_are_stable_across_windows() {
        let item = weekly_item();
        let january = build_schedule(&item, dt(2025, 1, 1, 0, 0), dt(2025, 1, 31, 23, 59));
        let mid_january = build_schedule(&item, dt(2025, 1, 10, 0, 0), dt(2025, 1, 31, 23, 59));
        assert_eq!(mid_january[0].occurrence_id, january[1].occurrence_id);
        assert_eq!(mid_january[0].start, january[1].start);
    }
}
