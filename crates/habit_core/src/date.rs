//! Local calendar-day helpers.
//!
//! Every date in this crate is a [`NaiveDate`]: a year/month/day value with no
//! time of day and no zone. "Today" is read from the local wall clock fields,
//! never from a UTC instant, so the day does not shift late in the evening.

use chrono::{Days, Local, NaiveDate};

use crate::error::HabitError;

/// Canonical on-the-wire representation of a calendar day.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current local date. Swapped out in tests.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Reads the machine's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        today()
    }
}

/// A clock pinned to one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// The local calendar date right now.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Formats `date` as zero-padded `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a canonical `YYYY-MM-DD` string.
///
/// Only the exact output of [`format_date`] is accepted: unpadded fields,
/// surrounding whitespace and impossible days are rejected.
pub fn parse_date(input: &str) -> Result<NaiveDate, HabitError> {
    let date = NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|_| HabitError::InvalidDateFormat(input.to_string()))?;
    if format_date(date) != input {
        return Err(HabitError::InvalidDateFormat(input.to_string()));
    }
    Ok(date)
}

/// Shifts `date` by `days` (negative moves backwards). `None` only when the
/// result leaves chrono's representable range.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_with_zero_padding() {
        assert_eq!(format_date(ymd(2024, 6, 1)), "2024-06-01");
        assert_eq!(format_date(ymd(987, 12, 31)), "0987-12-31");
    }

    #[test]
    fn parses_canonical_dates() {
        assert_eq!(parse_date("2024-02-29"), Ok(ymd(2024, 2, 29)));
    }

    #[test]
    fn rejects_malformed_dates() {
        for bad in [
            "2024-13-40",
            "2023-02-29",
            "2024-6-1",
            " 2024-06-01",
            "2024/06/01",
            "",
            "yesterday",
        ] {
            assert_eq!(
                parse_date(bad),
                Err(HabitError::InvalidDateFormat(bad.to_string())),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn add_days_crosses_month_and_year_boundaries() {
        assert_eq!(add_days(ymd(2024, 2, 28), 1), Some(ymd(2024, 2, 29)));
        assert_eq!(add_days(ymd(2023, 12, 31), 1), Some(ymd(2024, 1, 1)));
        assert_eq!(add_days(ymd(2024, 3, 1), -1), Some(ymd(2024, 2, 29)));
        assert_eq!(add_days(ymd(2024, 1, 1), -366), Some(ymd(2022, 12, 31)));
        assert_eq!(add_days(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn fixed_clock_reports_its_day() {
        let clock = FixedClock(ymd(2024, 6, 2));
        assert_eq!(clock.today(), ymd(2024, 6, 2));
    }
}
