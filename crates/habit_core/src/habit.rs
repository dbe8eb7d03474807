use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::HabitError;
use crate::recurrence::{parse_kind, parse_weekday, Recurrence, RecurrenceKind};

/// Opaque, stable habit identifier as issued by the habit source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HabitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One entry of a habit's `days` list. Weekly habits store weekday labels,
/// monthly habits store days of month either as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayValue {
    Number(u32),
    Text(String),
}

/// A habit exactly as the habit source hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRecord {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    /// Missing or null means the habit has no recurrence and is never due.
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub days: Vec<DayValue>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<DayValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<DayValue>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A habit with its recurrence normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub recurrence: Recurrence,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub active: bool,
}

impl Habit {
    pub fn new(id: impl Into<String>, name: impl Into<String>, recurrence: Recurrence) -> Self {
        Self {
            id: HabitId::new(id),
            name: name.into(),
            recurrence,
            icon: None,
            color: None,
            category: None,
            active: true,
        }
    }

    /// Normalizes a raw record. Never fails: malformed rules become
    /// never-due habits and [`Habit::validate`] reports them.
    pub fn from_record(record: HabitRecord) -> Self {
        let recurrence = build_recurrence(&record.id, record.frequency.as_deref(), &record.days);
        Self {
            id: HabitId::new(record.id),
            name: record.name,
            recurrence,
            icon: record.icon,
            color: record.color,
            category: record.category,
            active: record.active,
        }
    }

    /// Whether this habit is due on `date`. Inactive habits are never due.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.active && self.recurrence.applies_on(date)
    }

    /// Reports recurrence data that makes the habit never due.
    pub fn validate(&self) -> Result<(), HabitError> {
        if let Recurrence::Unrecognized { label } = &self.recurrence {
            return Err(HabitError::UnrecognizedRecurrence {
                habit_id: self.id.to_string(),
                kind: label.clone(),
            });
        }
        if self.recurrence.has_empty_day_set() {
            return Err(HabitError::EmptyDaySet {
                habit_id: self.id.to_string(),
                kind: self.recurrence.kind_name(),
            });
        }
        Ok(())
    }
}

fn build_recurrence(habit_id: &str, frequency: Option<&str>, days: &[DayValue]) -> Recurrence {
    let label = frequency.unwrap_or_default();
    let Some(kind) = parse_kind(label) else {
        tracing::warn!(habit_id, frequency = label, "unrecognized habit frequency");
        return Recurrence::Unrecognized {
            label: label.to_string(),
        };
    };

    match kind {
        RecurrenceKind::Daily => Recurrence::Daily,
        RecurrenceKind::Weekly => {
            let mut weekdays = HashSet::new();
            for value in days {
                let parsed = match value {
                    DayValue::Text(label) => parse_weekday(label),
                    DayValue::Number(_) => None,
                };
                match parsed {
                    Some(weekday) => {
                        weekdays.insert(weekday);
                    }
                    None => tracing::warn!(habit_id, ?value, "dropping unknown weekday label"),
                }
            }
            if weekdays.is_empty() {
                tracing::warn!(habit_id, "weekly habit has no valid weekdays");
            }
            Recurrence::Weekly { weekdays }
        }
        RecurrenceKind::Monthly => {
            let mut days_of_month = BTreeSet::new();
            for value in days {
                let parsed = match value {
                    DayValue::Number(day) => Some(*day),
                    DayValue::Text(text) => text.trim().parse::<u32>().ok(),
                };
                match parsed.filter(|day| (1..=31).contains(day)) {
                    Some(day) => {
                        days_of_month.insert(day);
                    }
                    None => tracing::warn!(habit_id, ?value, "dropping invalid day of month"),
                }
            }
            if days_of_month.is_empty() {
                tracing::warn!(habit_id, "monthly habit has no valid days");
            }
            Recurrence::Monthly { days_of_month }
        }
    }
}
