use thiserror::Error;

/// Failures raised by the pure habit computations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HabitError {
    /// The input is not a canonical, valid `YYYY-MM-DD` calendar date.
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    /// The habit's frequency label does not name a known recurrence.
    #[error("habit `{habit_id}` has unrecognized recurrence `{kind}`")]
    UnrecognizedRecurrence { habit_id: String, kind: String },

    /// A weekly or monthly habit has no days configured.
    #[error("habit `{habit_id}` has no days configured for its {kind} recurrence")]
    EmptyDaySet { habit_id: String, kind: &'static str },

    #[error("habit `{0}` is not loaded")]
    UnknownHabit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            HabitError::InvalidDateFormat("2024-13-40".into()).to_string(),
            "invalid date `2024-13-40`, expected YYYY-MM-DD"
        );
        assert_eq!(
            HabitError::EmptyDaySet {
                habit_id: "h1".into(),
                kind: "weekly"
            }
            .to_string(),
            "habit `h1` has no days configured for its weekly recurrence"
        );
    }
}
