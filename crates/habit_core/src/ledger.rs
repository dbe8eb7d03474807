use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::habit::HabitId;

/// Which habits were completed on which calendar day.
///
/// A `(date, habit)` pair is present at most once, and days with no
/// completions are not stored, so two ledgers holding the same completions
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompletionLedger {
    days: BTreeMap<NaiveDate, BTreeSet<HabitId>>,
}

impl<'de> Deserialize<'de> for CompletionLedger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut days = BTreeMap::<NaiveDate, BTreeSet<HabitId>>::deserialize(deserializer)?;
        days.retain(|_, ids| !ids.is_empty());
        Ok(Self { days })
    }
}

/// One completion row as exchanged with the completion source. Writing it is
/// an upsert keyed by `(habit_id, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub habit_id: HabitId,
    pub date: NaiveDate,
    pub completed: bool,
}

/// Result of [`CompletionLedger::rollover_if_new_day`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollover {
    pub ledger: CompletionLedger,
    pub last_checked: NaiveDate,
    /// Whether a stale entry for the new day was dropped.
    pub cleared: bool,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a completion history; the last record for a pair wins.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CompletionRecord>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            ledger.apply_record(record);
        }
        ledger
    }

    pub fn is_completed(&self, habit_id: &HabitId, date: NaiveDate) -> bool {
        self.days
            .get(&date)
            .map(|ids| ids.contains(habit_id))
            .unwrap_or(false)
    }

    /// Returns a ledger in which `habit_id` is completed on `date` iff
    /// `desired`. Calling it again with the opposite flag undoes it exactly.
    pub fn toggle(&self, habit_id: &HabitId, date: NaiveDate, desired: bool) -> Self {
        let mut next = self.clone();
        next.set(habit_id, date, desired);
        next
    }

    /// In-place form of [`CompletionLedger::toggle`]. Returns whether the
    /// ledger changed.
    pub fn set(&mut self, habit_id: &HabitId, date: NaiveDate, desired: bool) -> bool {
        if desired {
            return self.days.entry(date).or_default().insert(habit_id.clone());
        }
        let Some(ids) = self.days.get_mut(&date) else {
            return false;
        };
        let removed = ids.remove(habit_id);
        if ids.is_empty() {
            self.days.remove(&date);
        }
        removed
    }

    pub fn apply_record(&mut self, record: &CompletionRecord) -> bool {
        self.set(&record.habit_id, record.date, record.completed)
    }

    /// Day-change hygiene.
    ///
    /// When the session last ran on a different day, any entry already
    /// recorded under `today` is a leftover from that earlier session and is
    /// dropped. A first session (`last_checked == None`) only records today.
    /// Must run before anything reads today's completions.
    pub fn rollover_if_new_day(self, last_checked: Option<NaiveDate>, today: NaiveDate) -> Rollover {
        let mut ledger = self;
        let cleared = match last_checked {
            Some(previous) if previous != today => ledger.clear_date(today),
            _ => false,
        };
        Rollover {
            ledger,
            last_checked: today,
            cleared,
        }
    }

    /// Removes every completion stored for `date`.
    pub fn clear_date(&mut self, date: NaiveDate) -> bool {
        self.days.remove(&date).is_some()
    }

    pub fn completed_on(&self, date: NaiveDate) -> impl Iterator<Item = &HabitId> {
        self.days.get(&date).into_iter().flatten()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Flattens the ledger into upsert rows, one per completion.
    pub fn to_records(&self) -> Vec<CompletionRecord> {
        self.days
            .iter()
            .flat_map(|(date, ids)| {
                ids.iter().map(move |id| CompletionRecord {
                    habit_id: id.clone(),
                    date: *date,
                    completed: true,
                })
            })
            .collect()
    }
}
