//! Working-day calendar.
//!
//! Working days are Monday through Friday minus an injected holiday set.
//! All durations in the system are whole working days; this module is the
//! single place that maps them onto calendar dates.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Five-day week plus a holiday set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WorkCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn holidays(&self) -> impl Iterator<Item = &NaiveDate> {
        self.holidays.iter()
    }

    /// Check if a date is a working day (weekday and not a holiday).
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// First working day on or after `date`.
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_working_day(current) {
            current = current.succ_opt().unwrap_or(current);
        }
        current
    }

    /// Advance `days` working days from `start`. Zero or negative days
    /// returns `start` unchanged.
    pub fn add_working_days(&self, start: NaiveDate, days: i64) -> NaiveDate {
        if days <= 0 {
            return start;
        }
        let mut current = start;
        let mut remaining = days;
        while remaining > 0 {
            current = current.succ_opt().unwrap_or(current);
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }
        current
    }

    /// Count working days strictly after `start` up to and including `end`.
    pub fn count_working_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if end <= start {
            return 0;
        }
        let mut current = start;
        let mut count = 0;
        while current < end {
            current = current.succ_opt().unwrap_or(current);
            if self.is_working_day(current) {
                count += 1;
            }
        }
        count
    }

    /// All working days in the inclusive range `[start, end]`.
    pub fn working_days_in(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut current = start;
        while current <= end {
            if self.is_working_day(current) {
                days.push(current);
            }
            current = match current.succ_opt() {
                Some(d) => d,
                None => break,
            };
        }
        days
    }
}
