use std::str::FromStr;

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Repetition period granularity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_token(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized frequency token: {0}")]
pub struct ParseFrequencyError(pub String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    /// Tokens are matched in their canonical uppercase form only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(ParseFrequencyError(other.to_string())),
        }
    }
}

pub fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn weekday_from_token(token: &str) -> Option<Weekday> {
    match token {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Canonical definition of a repeating schedule.
///
/// An absent `frequency` makes the rule inert: it yields no recurring
/// occurrences. An absent `anchor` makes the rule unexpandable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Option<Frequency>,
    pub interval: u32,
    pub by_weekday: Vec<Weekday>,
    pub by_month_day: Vec<i32>,
    pub by_month: Vec<u32>,
    pub set_position: Option<i32>,
    pub count: Option<u32>,
    pub until: Option<NaiveDateTime>,
    pub anchor: Option<NaiveDateTime>,
    pub duration_ms: Option<i64>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            frequency: None,
            interval: 1,
            by_weekday: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            set_position: None,
            count: None,
            until: None,
            anchor: None,
            duration_ms: None,
        }
    }
}

impl RecurrenceRule {
    pub fn at(anchor: NaiveDateTime) -> Self {
        Self {
            anchor: Some(anchor),
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.frequency.is_some()
    }

    /// Apply a frequency token. Anything but the four canonical tokens leaves
    /// the rule non-recurring.
    pub fn set_frequency_token(&mut self, token: &str) {
        match token.parse() {
            Ok(frequency) => self.frequency = Some(frequency),
            Err(_) => {
                tracing::debug!(token, "unknown frequency token, rule stays non-recurring");
                self.frequency = None;
            }
        }
    }

    pub fn set_interval(&mut self, value: i64) {
        match u32::try_from(value) {
            Ok(interval) if interval >= 1 => self.interval = interval,
            _ => tracing::debug!(value, "ignoring non-positive repeat interval"),
        }
    }

    pub fn add_weekday_token(&mut self, token: &str) {
        match weekday_from_token(token) {
            Some(day) => {
                if !self.by_weekday.contains(&day) {
                    self.by_weekday.push(day);
                }
            }
            None => tracing::debug!(token, "ignoring unknown weekday token"),
        }
    }

    pub fn add_month(&mut self, value: i64) {
        match u32::try_from(value) {
            Ok(month) if (1..=12).contains(&month) => {
                if let Err(idx) = self.by_month.binary_search(&month) {
                    self.by_month.insert(idx, month);
                }
            }
            _ => tracing::debug!(value, "ignoring out-of-range month"),
        }
    }

    pub fn add_month_day(&mut self, value: i64) {
        match i32::try_from(value) {
            Ok(day) if (1..=31).contains(&day) || (-31..=-1).contains(&day) => {
                if let Err(idx) = self.by_month_day.binary_search(&day) {
                    self.by_month_day.insert(idx, day);
                }
            }
            _ => tracing::debug!(value, "ignoring out-of-range month day"),
        }
    }

    /// Non-zero with absolute value at most 366; anything else is treated as
    /// absent.
    pub fn set_set_position(&mut self, value: i64) {
        match i32::try_from(value) {
            Ok(position) if position != 0 && position.abs() <= 366 => {
                self.set_position = Some(position);
            }
            _ => tracing::debug!(value, "ignoring out-of-range set position"),
        }
    }

    pub fn set_count(&mut self, value: i64) {
        match u32::try_from(value) {
            Ok(count) if count >= 1 => self.count = Some(count),
            _ => tracing::debug!(value, "ignoring non-positive occurrence count"),
        }
    }

    pub fn set_duration_ms(&mut self, value: i64) {
        if value >= 0 {
            self.duration_ms = Some(value);
        } else {
            tracing::debug!(value, "ignoring negative duration");
        }
    }
}
