use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Calendar days on which an occurrence has been checked off. Semantically a
/// set; duplicate timestamps for the same day collapse to one entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    days: BTreeSet<NaiveDate>,
}

impl CompletionRecord {
    /// Build a record from ISO date / date-time strings. Unparseable entries
    /// are dropped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut days = BTreeSet::new();
        for entry in entries {
            let entry = entry.as_ref();
            match entry_day(entry) {
                Some(day) => {
                    days.insert(day);
                }
                None => tracing::debug!(entry, "dropping unparseable completion entry"),
            }
        }
        Self { days }
    }

    pub fn insert_day(&mut self, day: NaiveDate) {
        self.days.insert(day);
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.days.contains(&day)
    }

    /// A match on calendar day alone marks the occurrence complete,
    /// regardless of the recorded time.
    pub fn is_completed(&self, start: NaiveDateTime) -> bool {
        self.days.contains(&start.date())
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }
}

/// The calendar day named by an ISO date or date-time string. The leading
/// `YYYY-MM-DD` is taken literally; no timezone conversion is applied.
pub fn entry_day(entry: &str) -> Option<NaiveDate> {
    let head = entry.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
