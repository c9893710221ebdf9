use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::rule::{Frequency, RecurrenceRule};

/// One concrete instance of a repeating schedule. Derived on demand, never
/// persisted; identified externally by its source item and `index`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Occurrence {
    pub index: u32,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub completed: bool,
}

impl Occurrence {
    fn new(index: u32, start: NaiveDateTime, duration_ms: Option<i64>) -> Self {
        let end = duration_ms.and_then(|ms| start.checked_add_signed(Duration::milliseconds(ms)));
        Self {
            index,
            start,
            end,
            completed: false,
        }
    }
}

/// Expand `rule` into the ordered occurrences whose starts fall inside
/// `[window_start, window_end]`, both bounds inclusive.
///
/// Occurrence indices are numbered from the anchor, so the same occurrence
/// keeps the same index no matter which window it is observed through. The
/// stepping loop is bounded by the window (and `until`), never by `count`
/// alone.
pub fn expand(
    rule: &RecurrenceRule,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<Occurrence> {
    if window_start > window_end {
        return Vec::new();
    }
    let Some(anchor) = rule.anchor else {
        return Vec::new();
    };
    let Some(frequency) = rule.frequency else {
        // A non-recurring item still surfaces as a single event.
        if anchor >= window_start && anchor <= window_end {
            return vec![Occurrence::new(0, anchor, rule.duration_ms)];
        }
        return Vec::new();
    };

    let hard_end = match rule.until {
        Some(until) => window_end.min(until),
        None => window_end,
    };
    let interval = i64::from(rule.interval.max(1));
    let time = anchor.time();
    let set_position = effective_set_position(rule);

    let mut out = Vec::new();
    let mut index: u32 = 0;
    'periods: for period in 0i64.. {
        let Some(dates) = period_candidates(rule, frequency, anchor, period * interval, hard_end.date())
        else {
            break;
        };
        let dates: Vec<NaiveDate> = match set_position {
            Some(position) => select_set_position(&dates, position).into_iter().collect(),
            None => dates,
        };
        for date in dates {
            let start = date.and_time(time);
            if start < anchor {
                continue;
            }
            if start > hard_end {
                break 'periods;
            }
            if let Some(count) = rule.count {
                if index >= count {
                    break 'periods;
                }
            }
            if start >= window_start {
                out.push(Occurrence::new(index, start, rule.duration_ms));
            }
            index += 1;
        }
    }

    // Construction order is already ascending; sorting is the safety net
    // against constraint interactions.
    out.sort_by_key(|occurrence| occurrence.start);
    out
}

/// The candidate dates of one frequency period, `steps` frequency units past
/// the anchor. `None` means the period lies beyond `horizon` (or past the
/// calendar's range) and stepping can stop.
fn period_candidates(
    rule: &RecurrenceRule,
    frequency: Frequency,
    anchor: NaiveDateTime,
    steps: i64,
    horizon: NaiveDate,
) -> Option<Vec<NaiveDate>> {
    let anchor_date = anchor.date();
    match frequency {
        Frequency::Daily => {
            let date = anchor_date.checked_add_signed(Duration::days(steps))?;
            if date > horizon {
                return None;
            }
            Some(daily_candidates(rule, date))
        }
        Frequency::Weekly => {
            let week_start =
                start_of_week(anchor_date)?.checked_add_signed(Duration::days(steps * 7))?;
            if week_start > horizon {
                return None;
            }
            Some(weekly_candidates(rule, week_start, anchor_date.weekday()))
        }
        Frequency::Monthly => {
            // Month positions are computed by ordinal arithmetic from the
            // anchor so a clamped month end does not drift the series.
            let months = i64::from(anchor_date.year()) * 12 + i64::from(anchor_date.month0()) + steps;
            let year = i32::try_from(months.div_euclid(12)).ok()?;
            let month = (months.rem_euclid(12) + 1) as u32;
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            if first > horizon {
                return None;
            }
            Some(monthly_candidates(rule, year, month, anchor_date.day()))
        }
        Frequency::Yearly => {
            let year = i32::try_from(i64::from(anchor_date.year()) + steps).ok()?;
            let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
            if first > horizon {
                return None;
            }
            Some(yearly_candidates(rule, year, anchor_date))
        }
    }
}

fn daily_candidates(rule: &RecurrenceRule, date: NaiveDate) -> Vec<NaiveDate> {
    if !month_allowed(rule, date.month()) {
        return Vec::new();
    }
    if !rule.by_month_day.is_empty() && !month_day_matches(&rule.by_month_day, date) {
        return Vec::new();
    }
    if !rule.by_weekday.is_empty() && !rule.by_weekday.contains(&date.weekday()) {
        return Vec::new();
    }
    vec![date]
}

/// Weeks run Monday-first. Without a weekday constraint the anchor's weekday
/// is kept; with one, every listed weekday of the period's week qualifies.
fn weekly_candidates(
    rule: &RecurrenceRule,
    week_start: NaiveDate,
    anchor_weekday: Weekday,
) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = if rule.by_weekday.is_empty() {
        let offset = i64::from(anchor_weekday.num_days_from_monday());
        week_start
            .checked_add_signed(Duration::days(offset))
            .into_iter()
            .collect()
    } else {
        (0..7)
            .filter_map(|offset| week_start.checked_add_signed(Duration::days(offset)))
            .filter(|date| rule.by_weekday.contains(&date.weekday()))
            .collect()
    };
    days.retain(|date| month_allowed(rule, date.month()));
    days
}

fn monthly_candidates(
    rule: &RecurrenceRule,
    year: i32,
    month: u32,
    anchor_day: u32,
) -> Vec<NaiveDate> {
    if !month_allowed(rule, month) {
        return Vec::new();
    }
    if !rule.by_weekday.is_empty() {
        let mut days = weekdays_in_month(year, month, &rule.by_weekday);
        if !rule.by_month_day.is_empty() {
            days.retain(|date| month_day_matches(&rule.by_month_day, *date));
        }
        days
    } else if !rule.by_month_day.is_empty() {
        resolve_month_days(year, month, &rule.by_month_day)
    } else {
        // Months without the anchor's day (e.g. the 31st) are skipped.
        NaiveDate::from_ymd_opt(year, month, anchor_day)
            .into_iter()
            .collect()
    }
}

fn yearly_candidates(rule: &RecurrenceRule, year: i32, anchor_date: NaiveDate) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = Vec::new();
    if !rule.by_weekday.is_empty() {
        let months: Vec<u32> = if rule.by_month.is_empty() {
            (1..=12).collect()
        } else {
            rule.by_month.clone()
        };
        for month in months {
            days.extend(weekdays_in_month(year, month, &rule.by_weekday));
        }
        if !rule.by_month_day.is_empty() {
            days.retain(|date| month_day_matches(&rule.by_month_day, *date));
        }
    } else if !rule.by_month.is_empty() {
        for &month in &rule.by_month {
            if rule.by_month_day.is_empty() {
                days.extend(NaiveDate::from_ymd_opt(year, month, anchor_date.day()));
            } else {
                days.extend(resolve_month_days(year, month, &rule.by_month_day));
            }
        }
    } else if !rule.by_month_day.is_empty() {
        for month in 1..=12 {
            days.extend(resolve_month_days(year, month, &rule.by_month_day));
        }
    } else {
        // A Feb 29 anchor only recurs on leap years.
        days.extend(NaiveDate::from_ymd_opt(
            year,
            anchor_date.month(),
            anchor_date.day(),
        ));
    }
    days.sort();
    days.dedup();
    days
}

fn month_allowed(rule: &RecurrenceRule, month: u32) -> bool {
    rule.by_month.is_empty() || rule.by_month.contains(&month)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Resolve one BYMONTHDAY value against a concrete month; negative values
/// count from the month's end (-1 = last day).
fn resolve_month_day(year: i32, month: u32, value: i32) -> Option<u32> {
    let len = days_in_month(year, month) as i32;
    let day = if value > 0 { value } else { len + 1 + value };
    (1..=len).contains(&day).then_some(day as u32)
}

fn resolve_month_days(year: i32, month: u32, values: &[i32]) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = values
        .iter()
        .filter_map(|&value| resolve_month_day(year, month, value))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .collect();
    days.sort();
    days.dedup();
    days
}

fn month_day_matches(values: &[i32], date: NaiveDate) -> bool {
    let len = days_in_month(date.year(), date.month()) as i32;
    let day = date.day() as i32;
    values
        .iter()
        .any(|&value| if value > 0 { value == day } else { len + 1 + value == day })
}

fn weekdays_in_month(year: i32, month: u32, weekdays: &[Weekday]) -> Vec<NaiveDate> {
    (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .filter(|date| weekdays.contains(&date.weekday()))
        .collect()
}

fn start_of_week(date: NaiveDate) -> Option<NaiveDate> {
    let offset = i64::from(date.weekday().num_days_from_monday());
    date.checked_sub_signed(Duration::days(offset))
}

/// The set-position selector only applies when there is a candidate list to
/// select among.
fn effective_set_position(rule: &RecurrenceRule) -> Option<i32> {
    rule.set_position
        .filter(|_| !(rule.by_weekday.is_empty() && rule.by_month_day.is_empty()))
}

/// Pick the Nth candidate of one period, 1-indexed; negative counts from the
/// end. Out of range selects nothing.
fn select_set_position(dates: &[NaiveDate], position: i32) -> Option<NaiveDate> {
    if position > 0 {
        dates.get(position as usize - 1).copied()
    } else {
        let idx = dates.len() as i64 + i64::from(position);
        usize::try_from(idx).ok().and_then(|i| dates.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn starts(occurrences: &[Occurrence]) -> Vec<NaiveDateTime> {
        occurrences.iter().map(|occ| occ.start).collect()
    }

    fn weekly_on(days: &[Weekday], anchor: NaiveDateTime) -> RecurrenceRule {
        let mut rule = RecurrenceRule::at(anchor);
        rule.frequency = Some(Frequency::Weekly);
        rule.by_weekday = days.to_vec();
        rule
    }

    #[test]
    fn weekly_mondays_of_january() {
        let rule = weekly_on(&[Weekday::Mon], dt(2025, 1, 6, 9, 0));
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 1, 31, 23, 59));
        assert_eq!(
            starts(&out),
            vec![
                dt(2025, 1, 6, 9, 0),
                dt(2025, 1, 13, 9, 0),
                dt(2025, 1, 20, 9, 0),
                dt(2025, 1, 27, 9, 0),
            ]
        );
        assert_eq!(
            out.iter().map(|occ| occ.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn monthly_last_day_handles_short_months() {
        let mut rule = RecurrenceRule::at(dt(2025, 1, 31, 0, 0));
        rule.frequency = Some(Frequency::Monthly);
        rule.by_month_day = vec![-1];
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 4, 30, 23, 59));
        assert_eq!(
            starts(&out),
            vec![
                dt(2025, 1, 31, 0, 0),
                dt(2025, 2, 28, 0, 0),
                dt(2025, 3, 31, 0, 0),
                dt(2025, 4, 30, 0, 0),
            ]
        );
    }

    #[test]
    fn last_friday_of_each_month() {
        let mut rule = RecurrenceRule::at(dt(2025, 1, 3, 12, 0));
        rule.frequency = Some(Frequency::Monthly);
        rule.by_weekday = vec![Weekday::Fri];
        rule.set_position = Some(-1);
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 12, 31, 23, 59));
        assert_eq!(out.len(), 12);
        for occurrence in &out {
            assert_eq!(occurrence.start.weekday(), Weekday::Fri);
            // No later Friday in the same month.
            let next_friday = occurrence.start.date() + Duration::days(7);
            assert_ne!(next_friday.month(), occurrence.start.date().month());
        }
        assert_eq!(out[0].start, dt(2025, 1, 31, 12, 0));
        assert_eq!(out[11].start, dt(2025, 12, 26, 12, 0));
    }

    #[test]
    fn count_caps_occurrences_under_wide_window() {
        let mut rule = RecurrenceRule::at(dt(2025, 6, 1, 8, 0));
        rule.frequency = Some(Frequency::Daily);
        rule.count = Some(3);
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2030, 1, 1, 0, 0));
        assert_eq!(
            starts(&out),
            vec![
                dt(2025, 6, 1, 8, 0),
                dt(2025, 6, 2, 8, 0),
                dt(2025, 6, 3, 8, 0),
            ]
        );
    }

    #[test]
    fn non_recurring_item_surfaces_once() {
        let mut rule = RecurrenceRule::at(dt(2025, 5, 1, 10, 0));
        rule.duration_ms = Some(3_600_000);
        let out = expand(&rule, dt(2025, 5, 1, 0, 0), dt(2025, 5, 1, 23, 59));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 0);
        assert_eq!(out[0].start, dt(2025, 5, 1, 10, 0));
        assert_eq!(out[0].end, Some(dt(2025, 5, 1, 11, 0)));

        let outside = expand(&rule, dt(2025, 5, 2, 0, 0), dt(2025, 5, 3, 0, 0));
        assert!(outside.is_empty());
    }

    #[test]
    fn window_subset_matches_direct_expansion() {
        let mut rule = weekly_on(&[Weekday::Tue, Weekday::Thu], dt(2025, 1, 7, 7, 30));
        rule.interval = 2;
        let wide = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 12, 31, 23, 59));
        let narrow_start = dt(2025, 3, 1, 0, 0);
        let narrow_end = dt(2025, 4, 30, 23, 59);
        let narrow = expand(&rule, narrow_start, narrow_end);
        let filtered: Vec<&Occurrence> = wide
            .iter()
            .filter(|occ| occ.start >= narrow_start && occ.start <= narrow_end)
            .collect();
        assert!(!narrow.is_empty());
        assert_eq!(
            narrow.iter().collect::<Vec<_>>(),
            filtered,
            "indices and starts must be window-independent"
        );
    }

    #[test]
    fn until_bounds_every_occurrence() {
        let mut rule = RecurrenceRule::at(dt(2025, 1, 1, 9, 0));
        rule.frequency = Some(Frequency::Daily);
        rule.until = Some(dt(2025, 1, 5, 9, 0));
        rule.count = Some(100);
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 12, 31, 0, 0));
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|occ| occ.start <= dt(2025, 1, 5, 9, 0)));

        // count still binds when tighter than until
        rule.count = Some(2);
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 12, 31, 0, 0));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn inverted_window_returns_nothing() {
        let mut rule = RecurrenceRule::at(dt(2025, 1, 6, 9, 0));
        rule.frequency = Some(Frequency::Daily);
        assert!(expand(&rule, dt(2025, 2, 1, 0, 0), dt(2025, 1, 1, 0, 0)).is_empty());
    }

    #[test]
    fn missing_anchor_returns_nothing() {
        let mut rule = RecurrenceRule::default();
        rule.frequency = Some(Frequency::Daily);
        assert!(expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 12, 31, 0, 0)).is_empty());
    }

    #[test]
    fn plain_monthly_skips_months_without_anchor_day() {
        let mut rule = RecurrenceRule::at(dt(2025, 1, 31, 6, 0));
        rule.frequency = Some(Frequency::Monthly);
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 5, 31, 23, 59));
        assert_eq!(
            starts(&out),
            vec![dt(2025, 1, 31, 6, 0), dt(2025, 3, 31, 6, 0), dt(2025, 5, 31, 6, 0)]
        );
    }

    #[test]
    fn yearly_leap_day_anchor_recurs_on_leap_years_only() {
        let mut rule = RecurrenceRule::at(dt(2024, 2, 29, 0, 0));
        rule.frequency = Some(Frequency::Yearly);
        let out = expand(&rule, dt(2024, 1, 1, 0, 0), dt(2030, 12, 31, 0, 0));
        assert_eq!(starts(&out), vec![dt(2024, 2, 29, 0, 0), dt(2028, 2, 29, 0, 0)]);
        assert_eq!(
            out.iter().map(|occ| occ.index).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn set_position_without_selector_is_ignored() {
        let mut rule = RecurrenceRule::at(dt(2025, 1, 15, 9, 0));
        rule.frequency = Some(Frequency::Monthly);
        rule.set_position = Some(-1);
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 3, 31, 23, 59));
        assert_eq!(
            starts(&out),
            vec![dt(2025, 1, 15, 9, 0), dt(2025, 2, 15, 9, 0), dt(2025, 3, 15, 9, 0)]
        );
    }

    #[test]
    fn yearly_by_month_picks_anchor_day_in_each_month() {
        let mut rule = RecurrenceRule::at(dt(2025, 3, 10, 18, 0));
        rule.frequency = Some(Frequency::Yearly);
        rule.by_month = vec![3, 9];
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2026, 12, 31, 0, 0));
        assert_eq!(
            starts(&out),
            vec![
                dt(2025, 3, 10, 18, 0),
                dt(2025, 9, 10, 18, 0),
                dt(2026, 3, 10, 18, 0),
                dt(2026, 9, 10, 18, 0),
            ]
        );
    }

    #[test]
    fn interval_steps_whole_periods() {
        let rule = {
            let mut rule = RecurrenceRule::at(dt(2025, 1, 6, 9, 0));
            rule.frequency = Some(Frequency::Weekly);
            rule.interval = 2;
            rule
        };
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 2, 28, 23, 59));
        assert_eq!(
            starts(&out),
            vec![
                dt(2025, 1, 6, 9, 0),
                dt(2025, 1, 20, 9, 0),
                dt(2025, 2, 3, 9, 0),
                dt(2025, 2, 17, 9, 0),
            ]
        );
    }

    #[test]
    fn anchor_mid_week_keeps_later_weekdays_of_first_week() {
        // Anchor on a Wednesday; Monday of the same week precedes the anchor
        // and must not be emitted.
        let rule = weekly_on(&[Weekday::Mon, Weekday::Fri], dt(2025, 1, 8, 9, 0));
        let out = expand(&rule, dt(2025, 1, 1, 0, 0), dt(2025, 1, 19, 23, 59));
        assert_eq!(
            starts(&out),
            vec![
                dt(2025, 1, 10, 9, 0),
                dt(2025, 1, 13, 9, 0),
                dt(2025, 1, 17, 9, 0),
            ]
        );
        assert_eq!(out[0].index, 0);
    }

    #[test]
    fn monthly_candidates_resolve_weekdays_and_negative_days() {
        let mut rule = RecurrenceRule::default();
        rule.by_weekday = vec![Weekday::Fri];
        assert_eq!(
            monthly_candidates(&rule, 2025, 2, 1),
            vec![
                NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 21).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            ]
        );

        let mut rule = RecurrenceRule::default();
        rule.by_month_day = vec![-1, 1];
        assert_eq!(
            monthly_candidates(&rule, 2024, 2, 1),
            vec![
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            ]
        );
    }

    #[test]
    fn weekly_candidates_expand_the_period_week() {
        let mut rule = RecurrenceRule::default();
        rule.by_weekday = vec![Weekday::Mon, Weekday::Sun];
        let week_start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        assert_eq!(
            weekly_candidates(&rule, week_start, Weekday::Wed),
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            ]
        );

        let plain = RecurrenceRule::default();
        assert_eq!(
            weekly_candidates(&plain, week_start, Weekday::Wed),
            vec![NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()]
        );
    }

    #[test]
    fn select_set_position_indexes_from_either_end() {
        let days: Vec<NaiveDate> = (1..=5)
            .map(|day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap())
            .collect();
        assert_eq!(select_set_position(&days, 1), Some(days[0]));
        assert_eq!(select_set_position(&days, 5), Some(days[4]));
        assert_eq!(select_set_position(&days, -1), Some(days[4]));
        assert_eq!(select_set_position(&days, -5), Some(days[0]));
        assert_eq!(select_set_position(&days, 6), None);
        assert_eq!(select_set_position(&days, -6), None);
    }

    #[test]
    fn days_in_month_is_leap_aware() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 4), 30);
    }
}
