//! Due/completed counting over a span of days.
//!
//! [`aggregate`] is the single counting routine behind every progress number:
//! week view, month view, calendar cells and the dashboard filter all go
//! through it or through [`day_progress`], which applies the same rule across
//! habits instead of across days.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date::add_days;
use crate::habit::Habit;
use crate::ledger::CompletionLedger;

/// An inclusive range of calendar days. `start > end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Monday through Sunday around `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let start = add_days(date, -offset).unwrap_or(date);
        let end = add_days(start, 6).unwrap_or(NaiveDate::MAX);
        Self::new(start, end)
    }

    /// First through last day of the calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next_month = if date.month() == 12 {
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
        };
        let end = next_month
            .and_then(|first| first.pred_opt())
            .unwrap_or(NaiveDate::MAX);
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.succ_opt()).take_while(move |d| *d <= end)
    }

    /// Splits the window into Monday-start weeks, the first and last clipped
    /// to the window.
    pub fn weeks(&self) -> Vec<DateWindow> {
        let mut weeks = Vec::new();
        if self.is_empty() {
            return weeks;
        }
        let mut cursor = self.start;
        loop {
            let week = DateWindow::week_of(cursor);
            let clipped = DateWindow::new(cursor, week.end.min(self.end));
            weeks.push(clipped);
            match clipped.end.succ_opt() {
                Some(next) if next <= self.end => cursor = next,
                _ => break,
            }
        }
        weeks
    }
}

/// Due and completed occurrences over some span, with the derived
/// percentage. The zero value is what an empty span reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub due_count: u32,
    pub completed_count: u32,
    /// `completed / due * 100`, rounded half up; 0 when nothing was due.
    pub percentage: u32,
}

impl Progress {
    pub fn from_counts(due_count: u32, completed_count: u32) -> Self {
        let percentage = if due_count == 0 {
            0
        } else {
            let scaled = u64::from(completed_count) * 200 + u64::from(due_count);
            (scaled / (2 * u64::from(due_count))) as u32
        };
        Self {
            due_count,
            completed_count,
            percentage,
        }
    }

    /// Adds the raw counts of two spans and recomputes the percentage.
    pub fn combine(self, other: Progress) -> Self {
        Self::from_counts(
            self.due_count + other.due_count,
            self.completed_count + other.completed_count,
        )
    }
}

/// Counts the days in `window` on which `habit` was due and how many of
/// those were completed. Completions on non-due days are ignored.
pub fn aggregate(habit: &Habit, ledger: &CompletionLedger, window: DateWindow) -> Progress {
    let mut due = 0;
    let mut completed = 0;
    for day in window.days().filter(|day| habit.applies_on(*day)) {
        due += 1;
        if ledger.is_completed(&habit.id, day) {
            completed += 1;
        }
    }
    Progress::from_counts(due, completed)
}

/// Across `habits`, how many were due on `date` and how many got done.
pub fn day_progress(habits: &[Habit], ledger: &CompletionLedger, date: NaiveDate) -> Progress {
    habits
        .iter()
        .map(|habit| aggregate(habit, ledger, DateWindow::day(date)))
        .fold(Progress::default(), Progress::combine)
}

/// [`day_progress`] for every day of `window`.
pub fn daily_breakdown(
    habits: &[Habit],
    ledger: &CompletionLedger,
    window: DateWindow,
) -> Vec<(NaiveDate, Progress)> {
    window
        .days()
        .map(|day| (day, day_progress(habits, ledger, day)))
        .collect()
}

/// Per-week totals of [`day_progress`], weeks as in [`DateWindow::weeks`].
pub fn weekly_breakdown(
    habits: &[Habit],
    ledger: &CompletionLedger,
    window: DateWindow,
) -> Vec<(DateWindow, Progress)> {
    window
        .weeks()
        .into_iter()
        .map(|week| {
            let total = week
                .days()
                .map(|day| day_progress(habits, ledger, day))
                .fold(Progress::default(), Progress::combine);
            (week, total)
        })
        .collect()
}
