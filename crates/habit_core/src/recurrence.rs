use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// When a habit is due.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly { weekdays: HashSet<Weekday> },
    /// Days above the length of a month never match in that month.
    Monthly { days_of_month: BTreeSet<u32> },
    /// Kept so the offending label can be reported; never due.
    Unrecognized { label: String },
}

impl Recurrence {
    /// Whether a habit with this rule is due on `date`.
    ///
    /// Empty day sets and unrecognized rules are never due.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        match self {
            Recurrence::Daily => true,
            Recurrence::Weekly { weekdays } => weekdays.contains(&date.weekday()),
            Recurrence::Monthly { days_of_month } => days_of_month.contains(&date.day()),
            Recurrence::Unrecognized { .. } => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly { .. } => "weekly",
            Recurrence::Monthly { .. } => "monthly",
            Recurrence::Unrecognized { .. } => "unrecognized",
        }
    }

    pub fn has_empty_day_set(&self) -> bool {
        match self {
            Recurrence::Weekly { weekdays } => weekdays.is_empty(),
            Recurrence::Monthly { days_of_month } => days_of_month.is_empty(),
            _ => false,
        }
    }
}

/// The recurrence family named by a frequency label, without its days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
}

/// Maps a frequency label (`diario`, `Semanal`, `monthly`, ...) to its kind.
pub fn parse_kind(label: &str) -> Option<RecurrenceKind> {
    match label.trim().to_lowercase().as_str() {
        "diario" | "diaria" | "daily" => Some(RecurrenceKind::Daily),
        "semanal" | "weekly" => Some(RecurrenceKind::Weekly),
        "mensual" | "monthly" => Some(RecurrenceKind::Monthly),
        _ => None,
    }
}

/// Normalizes a weekday label to a [`Weekday`].
///
/// Both stored vocabularies are accepted: three-letter codes (`lun`, `mie`,
/// `dom`) and full names in any case, with or without accents (`Lunes`,
/// `Miércoles`, `sabado`).
pub fn parse_weekday(label: &str) -> Option<Weekday> {
    let folded: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect();
    match folded.as_str() {
        "lun" | "lunes" => Some(Weekday::Mon),
        "mar" | "martes" => Some(Weekday::Tue),
        "mie" | "miercoles" => Some(Weekday::Wed),
        "jue" | "jueves" => Some(Weekday::Thu),
        "vie" | "viernes" => Some(Weekday::Fri),
        "sab" | "sabado" => Some(Weekday::Sat),
        "dom" | "domingo" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Full display name of a weekday, in the stored vocabulary.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miercoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sabado",
        Weekday::Sun => "Domingo",
    }
}
