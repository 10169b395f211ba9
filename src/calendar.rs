use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

/// A calendar month, stored as its first day. Rate denominators and trend
/// series are keyed by these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    first: NaiveDate,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Month> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Month { first })
    }

    pub fn containing(date: NaiveDate) -> Month {
        Month {
            first: date - Days::new(u64::from(date.day0())),
        }
    }

    pub fn first_day(self) -> NaiveDate {
        self.first
    }

    pub fn last_day(self) -> NaiveDate {
        self.first + Months::new(1) - Days::new(1)
    }

    pub fn prev(self) -> Month {
        Month::containing(self.first - Days::new(1))
    }

    pub fn contains(self, day: NaiveDate) -> bool {
        day >= self.first_day() && day <= self.last_day()
    }

    /// Three-letter month abbreviation, e.g. "Aug".
    pub fn label(self) -> String {
        self.first.format("%b").to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first.format("%Y-%m"))
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .with_context(|| format!("month must look like 2026-08, got {s:?}"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("invalid year in {s:?}"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("invalid month in {s:?}"))?;
        Month::new(year, month).with_context(|| format!("{s:?} is not a calendar month"))
    }
}

pub fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Lazy sequence of the weekdays between start and end inclusive. Cloning
/// restarts the walk from the beginning.
#[derive(Debug, Clone)]
pub struct WorkingDays {
    cursor: Option<NaiveDate>,
    end: NaiveDate,
}

pub fn working_days(start: NaiveDate, end: NaiveDate) -> WorkingDays {
    WorkingDays {
        cursor: Some(start),
        end,
    }
}

impl Iterator for WorkingDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while let Some(day) = self.cursor {
            if day > self.end {
                return None;
            }
            self.cursor = day.succ_opt();
            if !is_weekend(day) {
                return Some(day);
            }
        }
        None
    }
}

pub fn working_days_in_month(month: Month) -> u32 {
    working_days(month.first_day(), month.last_day()).count() as u32
}

/// Working days from the start of the month up to and including `as_of`.
/// Zero when `as_of` falls before the month; the full month once it has
/// fully elapsed.
pub fn working_days_elapsed(month: Month, as_of: NaiveDate) -> u32 {
    if as_of < month.first_day() {
        return 0;
    }
    working_days(month.first_day(), as_of.min(month.last_day())).count() as u32
}
