use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::habit::Habit;
use crate::ledger::CompletionLedger;
use crate::window::{aggregate, DateWindow};

/// Bucket boundaries for dashboard filtering, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressThresholds {
    /// Lowest percentage counted as [`PerformanceBucket::High`].
    pub high: u32,
    /// Lowest percentage counted as [`PerformanceBucket::Medium`].
    pub medium: u32,
}

impl Default for ProgressThresholds {
    fn default() -> Self {
        Self {
            high: 70,
            medium: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformanceBucket {
    High,
    Medium,
    Low,
}

impl PerformanceBucket {
    pub fn label(self) -> &'static str {
        match self {
            PerformanceBucket::High => "high",
            PerformanceBucket::Medium => "medium",
            PerformanceBucket::Low => "low",
        }
    }
}

pub fn classify(percentage: u32, thresholds: ProgressThresholds) -> PerformanceBucket {
    if percentage >= thresholds.high {
        PerformanceBucket::High
    } else if percentage >= thresholds.medium {
        PerformanceBucket::Medium
    } else {
        PerformanceBucket::Low
    }
}

/// Dashboard selection: everything, or one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressFilter {
    #[default]
    All,
    Only(PerformanceBucket),
}

impl ProgressFilter {
    pub fn matches(self, bucket: PerformanceBucket) -> bool {
        match self {
            ProgressFilter::All => true,
            ProgressFilter::Only(wanted) => wanted == bucket,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown progress filter `{0}`")]
pub struct UnknownFilter(pub String);

impl FromStr for ProgressFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todos" | "all" => Ok(ProgressFilter::All),
            "alto" | "high" => Ok(ProgressFilter::Only(PerformanceBucket::High)),
            "medio" | "medium" => Ok(ProgressFilter::Only(PerformanceBucket::Medium)),
            "bajo" | "low" => Ok(ProgressFilter::Only(PerformanceBucket::Low)),
            other => Err(UnknownFilter(other.to_string())),
        }
    }
}

/// Habits whose progress over `window` falls in the selected bucket.
pub fn filter_habits<'a>(
    habits: &'a [Habit],
    ledger: &CompletionLedger,
    window: DateWindow,
    filter: ProgressFilter,
    thresholds: ProgressThresholds,
) -> Vec<&'a Habit> {
    habits
        .iter()
        .filter(|habit| {
            let progress = aggregate(habit, ledger, window);
            filter.matches(classify(progress.percentage, thresholds))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Recurrence;
    use chrono::NaiveDate;

    #[test]
    fn classifies_at_the_default_boundaries() {
        let t = ProgressThresholds::default();
        assert_eq!(classify(100, t), PerformanceBucket::High);
        assert_eq!(classify(70, t), PerformanceBucket::High);
        assert_eq!(classify(69, t), PerformanceBucket::Medium);
        assert_eq!(classify(40, t), PerformanceBucket::Medium);
        assert_eq!(classify(39, t), PerformanceBucket::Low);
        assert_eq!(classify(0, t), PerformanceBucket::Low);
    }

    #[test]
    fn custom_thresholds_move_the_buckets() {
        let t = ProgressThresholds {
            high: 90,
            medium: 50,
        };
        assert_eq!(classify(80, t), PerformanceBucket::Medium);
        assert_eq!(classify(45, t), PerformanceBucket::Low);
    }

    #[test]
    fn parses_filter_labels() {
        assert_eq!("todos".parse::<ProgressFilter>(), Ok(ProgressFilter::All));
        assert_eq!(
            "Alto".parse::<ProgressFilter>(),
            Ok(ProgressFilter::Only(PerformanceBucket::High))
        );
        assert_eq!(
            "low".parse::<ProgressFilter>(),
            Ok(ProgressFilter::Only(PerformanceBucket::Low))
        );
        assert_eq!(
            "x".parse::<ProgressFilter>(),
            Err(UnknownFilter("x".into()))
        );
    }

    #[test]
    fn filters_by_weekly_progress() {
        let week = DateWindow::week_of(NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
        let done = Habit::new("done", "Agua", Recurrence::Daily);
        let idle = Habit::new("idle", "Correr", Recurrence::Daily);
        let mut ledger = CompletionLedger::new();
        for day in week.days() {
            ledger.set(&done.id, day, true);
        }
        let habits = vec![done, idle];
        let t = ProgressThresholds::default();

        let high = filter_habits(
            &habits,
            &ledger,
            week,
            ProgressFilter::Only(PerformanceBucket::High),
            t,
        );
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].id.as_str(), "done");

        let low = filter_habits(
            &habits,
            &ledger,
            week,
            ProgressFilter::Only(PerformanceBucket::Low),
            t,
        );
        assert_eq!(low[0].id.as_str(), "idle");

        assert_eq!(
            filter_habits(&habits, &ledger, week, ProgressFilter::All, t).len(),
            2
        );
    }
}
