use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::Habit;
use crate::ledger::CompletionLedger;

/// How many days the streak scan walks back before giving up. Habits with
/// a longer unbroken history undercount.
pub const STREAK_SCAN_LIMIT_DAYS: usize = 365;

/// Consecutive completed due days ending at `as_of`, or at the last due day
/// before it when `as_of` itself is still pending.
///
/// Days the habit is not due neither extend nor break the streak. Before the
/// first completion is found, missed days are skipped rather than ending the
/// scan, so the count anchors on the most recent completion.
pub fn current_streak(habit: &Habit, ledger: &CompletionLedger, as_of: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut anchored = false;
    let mut day = as_of;

    for _ in 0..STREAK_SCAN_LIMIT_DAYS {
        if habit.applies_on(day) {
            if ledger.is_completed(&habit.id, day) {
                streak += 1;
                anchored = true;
            } else if day != as_of && anchored {
                break;
            }
        }
        let Some(previous) = day.pred_opt() else {
            break;
        };
        day = previous;
    }

    streak
}

/// Calendar state of a habit on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    Completed,
    /// Due, not done, and already in the past.
    Missed,
    /// Due and not done yet, today or later.
    Pending,
    NotDue,
}

impl DayStatus {
    pub fn symbol(self) -> char {
        match self {
            DayStatus::Completed => 'X',
            DayStatus::Missed => '.',
            DayStatus::Pending => '-',
            DayStatus::NotDue => '_',
        }
    }
}

/// A completion on a day the habit was not due still counts as completed.
pub fn day_status(
    habit: &Habit,
    ledger: &CompletionLedger,
    date: NaiveDate,
    today: NaiveDate,
) -> DayStatus {
    if ledger.is_completed(&habit.id, date) {
        DayStatus::Completed
    } else if !habit.applies_on(date) {
        DayStatus::NotDue
    } else if date < today {
        DayStatus::Missed
    } else {
        DayStatus::Pending
    }
}

/// Status of the last `days` days, oldest first, ending at `today`.
pub fn history(
    habit: &Habit,
    ledger: &CompletionLedger,
    today: NaiveDate,
    days: usize,
) -> Vec<(NaiveDate, DayStatus)> {
    let mut out: Vec<(NaiveDate, DayStatus)> = std::iter::successors(Some(today), |d| d.pred_opt())
        .take(days)
        .map(|date| (date, day_status(habit, ledger, date, today)))
        .collect();
    out.reverse();
    out
}

/// Renders [`history`] as one symbol per day.
pub fn history_strip(habit: &Habit, ledger: &CompletionLedger, today: NaiveDate, days: usize) -> String {
    history(habit, ledger, today, days)
        .into_iter()
        .map(|(_, status)| status.symbol())
        .collect()
}
