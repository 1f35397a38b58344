//! Dose frequency rules.
//!
//! A frequency decides which calendar dates are dose days. Interval rules
//! (every other day, weekly) count from the medication's schedule anchor;
//! weekday sets ignore the anchor.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    EveryOtherDay,
    Weekly,
    /// Fixed days of the week, e.g. Mon/Wed/Fri.
    Custom { weekdays: Vec<Weekday> },
}

impl Frequency {
    /// Build a weekday-set frequency, sorted Monday-first with duplicates removed.
    pub fn custom(weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = weekdays.into_iter().collect();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();
        Frequency::Custom { weekdays: days }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, Frequency::Daily)
    }

    /// Period in days for interval rules; `None` for weekday sets.
    fn interval_days(&self) -> Option<i64> {
        match self {
            Frequency::Daily => Some(1),
            Frequency::EveryOtherDay => Some(2),
            Frequency::Weekly => Some(7),
            Frequency::Custom { .. } => None,
        }
    }

    /// Whether `date` is a dose day under this rule.
    pub fn is_scheduled(&self, anchor: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Frequency::Custom { weekdays } => weekdays.contains(&date.weekday()),
            _ => {
                let period = self.interval_days().unwrap_or(1);
                (date - anchor).num_days().rem_euclid(period) == 0
            }
        }
    }

    /// Number of dose days in the half-open range `[from, to)`.
    ///
    /// Closed form for interval rules, whole weeks plus a remainder for
    /// weekday sets, so the cost does not depend on the range length.
    pub fn scheduled_days_between(&self, anchor: NaiveDate, from: NaiveDate, to: NaiveDate) -> i64 {
        if to <= from {
            return 0;
        }

        match self {
            Frequency::Custom { weekdays } => {
                let span = (to - from).num_days();
                let full_weeks = span / 7;
                let mut count = full_weeks * weekdays.len() as i64;
                let tail_start = from + chrono::Duration::days(full_weeks * 7);
                for offset in 0..(span % 7) {
                    let day = tail_start + chrono::Duration::days(offset);
                    if weekdays.contains(&day.weekday()) {
                        count += 1;
                    }
                }
                count
            }
            _ => {
                let period = self.interval_days().unwrap_or(1);
                let a = (from - anchor).num_days();
                let b = (to - anchor).num_days();
                ceil_div(b, period) - ceil_div(a, period)
            }
        }
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    -((-value).div_euclid(divisor))
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// Storage spelling: `daily`, `every_other_day`, `weekly`, `custom:mon,wed,fri`.
impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => f.write_str("daily"),
            Frequency::EveryOtherDay => f.write_str("every_other_day"),
            Frequency::Weekly => f.write_str("weekly"),
            Frequency::Custom { weekdays } => {
                let codes: Vec<&str> = weekdays.iter().map(|d| weekday_code(*d)).collect();
                write!(f, "custom:{}", codes.join(","))
            }
        }
    }
}

impl FromStr for Frequency {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DatabaseError::InvalidEnum {
            field: "Frequency".into(),
            value: s.into(),
        };

        match s.trim() {
            "daily" => Ok(Frequency::Daily),
            "every_other_day" => Ok(Frequency::EveryOtherDay),
            "weekly" => Ok(Frequency::Weekly),
            other => {
                let list = other.strip_prefix("custom:").ok_or_else(invalid)?;
                let days = list
                    .split(',')
                    .map(|code| Weekday::from_str(code.trim()).map_err(|_| invalid()))
                    .collect::<Result<Vec<_>, _>>()?;
                if days.is_empty() {
                    return Err(invalid());
                }
                Ok(Frequency::custom(days))
            }
        }
    }
}
