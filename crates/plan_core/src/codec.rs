use chrono::{NaiveDate, NaiveDateTime};

use crate::rule::{weekday_from_token, weekday_token, RecurrenceRule};

/// Serialize a rule into the RFC 5545 RRULE clause grammar. Clauses are
/// emitted semicolon-joined in a fixed order; an inert rule encodes as the
/// empty string.
pub fn encode(rule: &RecurrenceRule) -> String {
    let Some(frequency) = rule.frequency else {
        return String::new();
    };
    let mut clauses = vec![format!("FREQ={}", frequency.as_token())];
    if rule.interval > 1 {
        clauses.push(format!("INTERVAL={}", rule.interval));
    }
    if !rule.by_weekday.is_empty() {
        let mut days = rule.by_weekday.clone();
        days.sort_by_key(|day| day.num_days_from_monday());
        let tokens: Vec<&str> = days.into_iter().map(weekday_token).collect();
        clauses.push(format!("BYDAY={}", tokens.join(",")));
    }
    if !rule.by_month.is_empty() {
        clauses.push(format!("BYMONTH={}", join_numbers(&rule.by_month)));
    }
    if !rule.by_month_day.is_empty() {
        clauses.push(format!("BYMONTHDAY={}", join_numbers(&rule.by_month_day)));
    }
    if let Some(position) = rule.set_position {
        if position != 0 {
            clauses.push(format!("BYSETPOS={position}"));
        }
    }
    if let Some(count) = rule.count {
        clauses.push(format!("COUNT={count}"));
    }
    if let Some(until) = rule.until {
        clauses.push(format!("UNTIL={}", until.format("%Y%m%d")));
    }
    clauses.join(";")
}

/// Reconstruct a rule from its clause string. Unknown keys are ignored for
/// forward compatibility and malformed values are dropped; decoding never
/// fails.
pub fn decode(text: &str, anchor: NaiveDateTime) -> RecurrenceRule {
    let mut rule = RecurrenceRule::at(anchor);
    for clause in text.split(';') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        let Some((key, value)) = clause.split_once('=') else {
            tracing::debug!(clause, "skipping clause without KEY=value shape");
            continue;
        };
        match key {
            "FREQ" => rule.set_frequency_token(value),
            "INTERVAL" => apply_number(value, |n| rule.set_interval(n)),
            "BYDAY" => {
                for token in value.split(',') {
                    rule.add_weekday_token(token.trim());
                }
            }
            "BYMONTH" => {
                for part in value.split(',') {
                    apply_number(part, |n| rule.add_month(n));
                }
            }
            "BYMONTHDAY" => {
                for part in value.split(',') {
                    apply_number(part, |n| rule.add_month_day(n));
                }
            }
            "BYSETPOS" => apply_number(value, |n| rule.set_set_position(n)),
            "COUNT" => apply_number(value, |n| rule.set_count(n)),
            "UNTIL" => rule.until = parse_until(value),
            _ => {}
        }
    }
    rule
}

fn apply_number<F: FnOnce(i64)>(raw: &str, apply: F) {
    match raw.trim().parse::<i64>() {
        Ok(value) => apply(value),
        Err(_) => tracing::debug!(raw, "dropping malformed numeric clause value"),
    }
}

/// Compact `YYYYMMDD` reads as midnight of that day; a full timestamp form is
/// accepted too. Anything unparseable means "no upper bound".
fn parse_until(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S") {
        return Some(datetime);
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn join_numbers<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(T::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
