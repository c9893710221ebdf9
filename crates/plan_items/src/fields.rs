use chrono::{DateTime, NaiveDate, NaiveDateTime};
use plan_core::{CompletionRecord, RecurrenceRule};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One markdown note's front-matter fields, as handed over by the host's
/// storage layer. Values are kept loose; the engine only ever sees what the
/// mapping below can make of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteItem {
    pub path: String,
    pub fields: Map<String, Value>,
}

impl NoteItem {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: Map::new(),
        }
    }

    pub fn with_fields(path: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    /// Build the canonical rule from the loose `repeat_*` front-matter
    /// fields. Out-of-range or malformed values degrade per field; nothing
    /// here fails.
    pub fn rule(&self) -> RecurrenceRule {
        let mut rule = RecurrenceRule::default();
        rule.anchor = self.fields.get("date_start_scheduled").and_then(host_date);
        if let (Some(anchor), Some(end)) = (
            rule.anchor,
            self.fields.get("date_end_scheduled").and_then(host_date),
        ) {
            rule.set_duration_ms((end - anchor).num_milliseconds());
        }
        if let Some(token) = string_field(&self.fields, "repeat_frequency") {
            rule.set_frequency_token(&token);
        }
        if let Some(value) = integer_field(&self.fields, "repeat_interval") {
            rule.set_interval(value);
        }
        for token in string_list(&self.fields, "repeat_byday") {
            rule.add_weekday_token(&token);
        }
        for value in integer_list(&self.fields, "repeat_bymonth") {
            rule.add_month(value);
        }
        for value in integer_list(&self.fields, "repeat_bymonthday") {
            rule.add_month_day(value);
        }
        if let Some(value) = integer_field(&self.fields, "repeat_bysetpos") {
            rule.set_set_position(value);
        }
        if let Some(value) = integer_field(&self.fields, "repeat_count") {
            rule.set_count(value);
        }
        rule.until = self.fields.get("repeat_until").and_then(host_date);
        rule
    }

    pub fn completions(&self) -> CompletionRecord {
        CompletionRecord::from_entries(string_list(&self.fields, "repeat_completed_dates"))
    }

    /// Append a day to the completed-dates list. This is the caller-side
    /// mutation made when an occurrence is checked off; the engine itself
    /// only reads the list.
    pub fn push_completed_day(&mut self, day: NaiveDate) {
        let entry = Value::String(day.format("%Y-%m-%d").to_string());
        match self.fields.get_mut("repeat_completed_dates") {
            Some(Value::Array(list)) => {
                if !list.contains(&entry) {
                    list.push(entry);
                }
            }
            _ => {
                self.fields
                    .insert("repeat_completed_dates".to_string(), Value::Array(vec![entry]));
            }
        }
    }
}

/// Normalize any host-provided date representation into the canonical
/// date-time the engine works with: ISO strings (date or date-time, with or
/// without offset), epoch milliseconds, and one level of `{"data": …}`
/// wrapping.
pub fn host_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(raw) => parse_date_str(raw),
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|datetime| datetime.naive_utc()),
        Value::Object(map) => match map.get("data")? {
            inner @ (Value::String(_) | Value::Number(_)) => host_date(inner),
            _ => None,
        },
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.naive_utc());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    scalar_string(fields.get(key)?)
}

fn integer_field(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    integer_value(fields.get(key)?)
}

/// List fields accept either an array or a single scalar.
fn string_list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::Array(values)) => values.iter().filter_map(scalar_string).collect(),
        Some(value) => scalar_string(value).into_iter().collect(),
        None => Vec::new(),
    }
}

fn integer_list(fields: &Map<String, Value>, key: &str) -> Vec<i64> {
    match fields.get(key) {
        Some(Value::Array(values)) => values.iter().filter_map(integer_value).collect(),
        Some(value) => integer_value(value).into_iter().collect(),
        None => Vec::new(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0)
                .map(|float| float as i64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}
