// src/dates.rs
//
// Calendar helpers. Dates are always built from (year, month, day) components;
// nothing here goes through a timezone-aware parser.

use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineError;

static API_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("API date regex is valid"));

/// Formats a date the way the attendance service expects it: `YYYY-MM-DD`.
pub fn format_api_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Parses `YYYY-MM-DD` (optionally followed by a `T...` time part, which is
/// ignored) into a local calendar date.
pub fn parse_api_date(input: &str) -> Option<NaiveDate> {
    let date_part = input.trim().split('T').next()?;
    let caps = API_DATE_RE.captures(date_part)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Inclusive `[from, to]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, EngineError> {
        if from > to {
            return Err(EngineError::InvalidWindow);
        }
        Ok(Self { from, to })
    }

    /// First to last day of the month containing `today`.
    pub fn month_of(today: NaiveDate) -> Self {
        let from = today.with_day(1).unwrap_or(today);
        let (next_year, next_month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        let to = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .unwrap_or(today);
        Self { from, to }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    pub fn len_days(&self) -> u32 {
        (self.to - self.from).num_days() as u32 + 1
    }

    /// Month-granularity inclusion: `(year, month)` lies between the window's
    /// start month and end month, both inclusive. Day-of-month is ignored.
    pub fn contains_month(&self, year: i32, month: u32) -> bool {
        let key = (year, month);
        key >= (self.from.year(), self.from.month()) && key <= (self.to.year(), self.to.month())
    }

    pub fn count_weekday(&self, weekday: Weekday) -> u32 {
        self.days().filter(|d| d.weekday() == weekday).count() as u32
    }
}
