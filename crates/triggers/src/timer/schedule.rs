//! Six-field NCRONTAB expressions: `{second} {minute} {hour} {day} {month} {day-of-week}`.
//!
//! Each field accepts `*`, a value, a range `a-b`, a step `*/n`, `a/n` or
//! `a-b/n`, or a comma-separated list of those. Months and weekdays also accept
//! three-letter names (`JAN`, `MON`). Day-of-week runs 0-6 from Sunday; 7 is
//! also Sunday. A time matches only when both the day-of-month and the
//! day-of-week fields match. All times are UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("expected 6 fields (second minute hour day month day-of-week), found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const SECOND: FieldSpec = FieldSpec { name: "second", min: 0, max: 59, names: &[] };
const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[] };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[] };
const DAY: FieldSpec = FieldSpec { name: "day", min: 1, max: 31, names: &[] };
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"],
};
const WEEKDAY: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"],
};

/// Parsed timer schedule.
///
/// Each field is a bitmask of the values it admits.
#[derive(Clone, PartialEq, Eq)]
pub struct Schedule {
    expression: String,
    seconds: u64,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [sec, min, hour, day, month, weekday] = fields.as_slice() else {
            return Err(ScheduleError::FieldCount(fields.len()));
        };

        let mut weekdays = parse_field(&WEEKDAY, weekday)?;
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays | 1) & !(1 << 7);
        }

        Ok(Self {
            expression: fields.join(" "),
            seconds: parse_field(&SECOND, sec)?,
            minutes: parse_field(&MINUTE, min)?,
            hours: parse_field(&HOUR, hour)?,
            days: parse_field(&DAY, day)?,
            months: parse_field(&MONTH, month)?,
            weekdays,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether `at` (truncated to the second) is an occurrence.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        bit(self.months, at.month())
            && self.matches_day(at.date_naive())
            && bit(self.hours, at.hour())
            && bit(self.minutes, at.minute())
            && bit(self.seconds, at.second())
    }

    /// First occurrence strictly after `after`.
    ///
    /// Returns `None` when nothing matches within the next five years (for
    /// example `0 0 0 30 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let limit_year = after.year() + 5;
        let mut t = after.with_nanosecond(0)? + Duration::seconds(1);

        while t.year() <= limit_year {
            if !bit(self.months, t.month()) {
                t = first_of_next_month(t.date_naive())?;
                continue;
            }
            if !self.matches_day(t.date_naive()) {
                t = midnight(t.date_naive().succ_opt()?)?;
                continue;
            }
            if !bit(self.hours, t.hour()) {
                t = t.with_minute(0)?.with_second(0)? + Duration::hours(1);
                continue;
            }
            if !bit(self.minutes, t.minute()) {
                t = t.with_second(0)? + Duration::minutes(1);
                continue;
            }
            if !bit(self.seconds, t.second()) {
                t += Duration::seconds(1);
                continue;
            }
            return Some(t);
        }

        None
    }

    fn matches_day(&self, date: NaiveDate) -> bool {
        bit(self.days, date.day()) && bit(self.weekdays, date.weekday().num_days_from_sunday())
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schedule").field(&self.expression).finish()
    }
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn first_of_next_month(date: NaiveDate) -> Option<DateTime<Utc>> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    midnight(NaiveDate::from_ymd_opt(year, month, 1)?)
}

fn parse_field(spec: &FieldSpec, text: &str) -> Result<u64, ScheduleError> {
    let invalid = |reason: &str| ScheduleError::InvalidField {
        field: spec.name,
        value: text.to_string(),
        reason: reason.to_string(),
    };

    let mut mask = 0u64;
    for part in text.split(',') {
        if part.is_empty() {
            return Err(invalid("empty list element"));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid("step is not a number"))?;
                if step == 0 {
                    return Err(invalid("step must be positive"));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (
                value(spec, a).ok_or_else(|| invalid("bad range start"))?,
                value(spec, b).ok_or_else(|| invalid("bad range end"))?,
            )
        } else {
            let v = value(spec, range).ok_or_else(|| invalid("not a number or name"))?;
            // `a/n` means "from a to the end, every n".
            (v, if step.is_some() { spec.max } else { v })
        };

        if lo < spec.min || hi > spec.max {
            return Err(invalid(&format!("out of range {}-{}", spec.min, spec.max)));
        }
        if lo > hi {
            return Err(invalid("range start is after range end"));
        }

        for v in (lo..=hi).step_by(step.unwrap_or(1) as usize) {
            mask |= 1u64 << v;
        }
    }

    Ok(mask)
}

fn value(spec: &FieldSpec, text: &str) -> Option<u32> {
    if let Ok(v) = text.parse::<u32>() {
        return Some(v);
    }
    let upper = text.to_ascii_uppercase();
    let index = spec.names.iter().position(|n| *n == upper)?;
    u32::try_from(index).ok().map(|i| i + spec.min)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn every_five_minutes() {
        let schedule = Schedule::parse("0 */5 * * * *").unwrap();
        assert_eq!(
            schedule.next_after(at(2024, 3, 1, 12, 3, 27)),
            Some(at(2024, 3, 1, 12, 5, 0))
        );
        // Strictly after: an exact occurrence moves on to the next one.
        assert_eq!(
            schedule.next_after(at(2024, 3, 1, 12, 5, 0)),
            Some(at(2024, 3, 1, 12, 10, 0))
        );
        assert_eq!(
            schedule.next_after(at(2024, 3, 1, 23, 58, 0)),
            Some(at(2024, 3, 2, 0, 0, 0))
        );
    }

    #[test]
    fn daily_at_midnight() {
        let schedule = Schedule::parse("0 0 0 * * *").unwrap();
        assert_eq!(
            schedule.next_after(at(2024, 3, 1, 10, 0, 0)),
            Some(at(2024, 3, 2, 0, 0, 0))
        );
        assert_eq!(
            schedule.next_after(at(2024, 12, 31, 0, 0, 1)),
            Some(at(2025, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn leap_day_and_impossible_dates() {
        let leap = Schedule::parse("0 0 12 29 2 *").unwrap();
        assert_eq!(
            leap.next_after(at(2023, 3, 1, 0, 0, 0)),
            Some(at(2024, 2, 29, 12, 0, 0))
        );

        let never = Schedule::parse("0 0 0 30 2 *").unwrap();
        assert_eq!(never.next_after(at(2024, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn weekday_names_and_ranges() {
        // 2024-03-02 is a Saturday.
        let schedule = Schedule::parse("0 30 9 * * MON-FRI").unwrap();
        assert_eq!(
            schedule.next_after(at(2024, 3, 2, 10, 0, 0)),
            Some(at(2024, 3, 4, 9, 30, 0))
        );

        let sunday = Schedule::parse("0 0 8 * * 7").unwrap();
        assert_eq!(
            sunday.next_after(at(2024, 3, 2, 10, 0, 0)),
            Some(at(2024, 3, 3, 8, 0, 0))
        );
    }

    #[test]
    fn day_and_weekday_must_both_match() {
        // Friday the 13th; 2024-09-13 follows 2024-03-01.
        let schedule = Schedule::parse("0 0 0 13 * FRI").unwrap();
        assert_eq!(
            schedule.next_after(at(2024, 3, 1, 0, 0, 0)),
            Some(at(2024, 9, 13, 0, 0, 0))
        );
    }

    #[test]
    fn lists_and_offset_steps() {
        let schedule = Schedule::parse("15,45 10/20 * * JAN,jul *").unwrap();
        assert!(schedule.matches(at(2024, 1, 5, 3, 30, 45)));
        assert!(schedule.matches(at(2024, 7, 5, 3, 50, 15)));
        assert!(!schedule.matches(at(2024, 7, 5, 3, 40, 15)));
        assert!(!schedule.matches(at(2024, 2, 5, 3, 30, 15)));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(Schedule::parse("* * *"), Err(ScheduleError::FieldCount(3)));
        assert!(matches!(
            Schedule::parse("61 * * * * *"),
            Err(ScheduleError::InvalidField { field: "second", .. })
        ));
        assert!(matches!(
            Schedule::parse("0 */0 * * * *"),
            Err(ScheduleError::InvalidField { field: "minute", .. })
        ));
        assert!(matches!(
            Schedule::parse("0 0 0 0 * *"),
            Err(ScheduleError::InvalidField { field: "day", .. })
        ));
        assert!(matches!(
            Schedule::parse("0 0 5-2 * * *"),
            Err(ScheduleError::InvalidField { field: "hour", .. })
        ));
        assert!(matches!(
            Schedule::parse("0 0 0 * FOO *"),
            Err(ScheduleError::InvalidField { field: "month", .. })
        ));
        assert!(matches!(
            Schedule::parse("0 0 0 * * 1,,2"),
            Err(ScheduleError::InvalidField { field: "day-of-week", .. })
        ));
    }

    #[test]
    fn display_normalizes_whitespace() {
        let schedule: Schedule = "0  */5 *\t* * *".parse().unwrap();
        assert_eq!(schedule.to_string(), "0 */5 * * * *");
    }

    proptest! {
        /// Property: the next occurrence is later than the input and matches the schedule.
        #[test]
        fn next_occurrence_is_later_and_matching(
            sec in 0u32..60,
            min in 0u32..60,
            hour in 0u32..24,
            start in 0i64..4_000_000_000i64,
        ) {
            let schedule = Schedule::parse(&format!("{sec} {min} {hour} * * *")).unwrap();
            let from = DateTime::<Utc>::from_timestamp(start, 0).unwrap();
            let next = schedule.next_after(from).unwrap();

            prop_assert!(next > from);
            prop_assert!(schedule.matches(next));
            prop_assert!(next - from <= Duration::days(1));
        }
    }
}
