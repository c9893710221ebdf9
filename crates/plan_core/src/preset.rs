use chrono::Weekday;
use serde::Serialize;

use crate::rule::{Frequency, RecurrenceRule};

/// A named quick-pick rule. The rule is partial: the anchor comes from the
/// item it is applied to.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Preset {
    pub label: &'static str,
    pub rule: RecurrenceRule,
}

/// The fixed table of common rules used to populate quick-pick UI.
pub fn catalog() -> Vec<Preset> {
    let mut every_weekday = base(Frequency::Weekly);
    every_weekday.by_weekday = vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    let mut every_other_week = base(Frequency::Weekly);
    every_other_week.interval = 2;

    let mut first_of_month = base(Frequency::Monthly);
    first_of_month.by_month_day = vec![1];

    let mut last_day_of_month = base(Frequency::Monthly);
    last_day_of_month.by_month_day = vec![-1];

    let mut last_friday_of_month = base(Frequency::Monthly);
    last_friday_of_month.by_weekday = vec![Weekday::Fri];
    last_friday_of_month.set_position = Some(-1);

    vec![
        Preset {
            label: "Every day",
            rule: base(Frequency::Daily),
        },
        Preset {
            label: "Every weekday",
            rule: every_weekday,
        },
        Preset {
            label: "Every week",
            rule: base(Frequency::Weekly),
        },
        Preset {
            label: "Every other week",
            rule: every_other_week,
        },
        Preset {
            label: "Every month",
            rule: base(Frequency::Monthly),
        },
        Preset {
            label: "First of the month",
            rule: first_of_month,
        },
        Preset {
            label: "Last day of the month",
            rule: last_day_of_month,
        },
        Preset {
            label: "Last Friday of the month",
            rule: last_friday_of_month,
        },
        Preset {
            label: "Every year",
            rule: base(Frequency::Yearly),
        },
    ]
}

fn base(frequency: Frequency) -> RecurrenceRule {
    RecurrenceRule {
        frequency: Some(frequency),
        ..RecurrenceRule::default()
    }
}
