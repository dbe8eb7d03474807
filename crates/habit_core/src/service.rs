use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    date::{Clock, SystemClock},
    error::HabitError,
    habit::{Habit, HabitId, HabitRecord},
    ledger::{CompletionLedger, CompletionRecord},
    performance::{classify, filter_habits, PerformanceBucket, ProgressFilter, ProgressThresholds},
    sink::LedgerSink,
    streak::{current_streak, history, DayStatus},
    window::{aggregate, day_progress, DateWindow, Progress},
};

/// Days of history carried by each [`HabitSummary`].
pub const SUMMARY_HISTORY_DAYS: usize = 14;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitSummary {
    pub id: HabitId,
    pub name: String,
    pub due_today: bool,
    pub completed_today: bool,
    pub streak: u32,
    pub weekly: Progress,
    pub monthly: Progress,
    /// Bucket of the weekly progress.
    pub bucket: PerformanceBucket,
    /// The last [`SUMMARY_HISTORY_DAYS`] days, oldest first.
    pub history: Vec<DayStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub date: NaiveDate,
    /// Habits due today and how many of them are done.
    pub today: Progress,
    pub habits: Vec<HabitSummary>,
}

#[derive(Debug, Default)]
struct LedgerState {
    ledger: CompletionLedger,
    last_checked: Option<NaiveDate>,
}

/// One user's session: a habit snapshot, the completion ledger, and the
/// clock that decides what "today" is.
///
/// Every query about today runs [`HabitSession::ensure_rollover`] first, so
/// a stale entry for a new day is never observed.
pub struct HabitSession {
    habits: RwLock<Vec<Habit>>,
    state: RwLock<LedgerState>,
    clock: Box<dyn Clock>,
    sink: Option<Box<dyn LedgerSink>>,
    thresholds: ProgressThresholds,
}

pub struct HabitSessionBuilder {
    habits: Vec<Habit>,
    ledger: CompletionLedger,
    last_checked: Option<NaiveDate>,
    clock: Box<dyn Clock>,
    sink: Option<Box<dyn LedgerSink>>,
    thresholds: ProgressThresholds,
}

impl Default for HabitSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitSessionBuilder {
    pub fn new() -> Self {
        Self {
            habits: Vec::new(),
            ledger: CompletionLedger::new(),
            last_checked: None,
            clock: Box::new(SystemClock),
            sink: None,
            thresholds: ProgressThresholds::default(),
        }
    }

    pub fn add_habit(mut self, habit: Habit) -> Self {
        Self::push_unique(&mut self.habits, habit);
        self
    }

    pub fn add_records(mut self, records: impl IntoIterator<Item = HabitRecord>) -> Self {
        for record in records {
            Self::push_unique(&mut self.habits, Habit::from_record(record));
        }
        self
    }

    /// Seeds the ledger from a cached snapshot.
    pub fn restore(mut self, ledger: CompletionLedger, last_checked: Option<NaiveDate>) -> Self {
        self.ledger = ledger;
        self.last_checked = last_checked;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ledger_sink(mut self, sink: Box<dyn LedgerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ProgressThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Fails when the ledger sink rejects the first write, which would
    /// otherwise leave the stored day marker stale.
    pub fn build(self) -> Result<HabitSession> {
        let session = HabitSession {
            habits: RwLock::new(self.habits),
            state: RwLock::new(LedgerState {
                ledger: self.ledger,
                last_checked: self.last_checked,
            }),
            clock: self.clock,
            sink: self.sink,
            thresholds: self.thresholds,
        };
        for warning in session.validation_warnings() {
            tracing::warn!(%warning, "habit will never be due");
        }
        let (_, persisted) = session.roll_over();
        persisted.context("failed to persist the ledger at session start")?;
        Ok(session)
    }

    fn push_unique(habits: &mut Vec<Habit>, habit: Habit) {
        if let Some(existing) = habits.iter_mut().find(|h| h.id == habit.id) {
            *existing = habit;
        } else {
            habits.push(habit);
        }
    }
}

impl HabitSession {
    pub fn builder() -> HabitSessionBuilder {
        HabitSessionBuilder::new()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn thresholds(&self) -> ProgressThresholds {
        self.thresholds
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.habits.read().clone()
    }

    pub fn habit(&self, id: &HabitId) -> Result<Habit> {
        self.habits
            .read()
            .iter()
            .find(|habit| &habit.id == id)
            .cloned()
            .ok_or_else(|| HabitError::UnknownHabit(id.to_string()).into())
    }

    /// Swaps in a fresh habit snapshot. Ledger history is kept as is, even
    /// for habits that disappeared.
    #[instrument(skip(self, records))]
    pub fn replace_habits(&self, records: impl IntoIterator<Item = HabitRecord>) {
        let habits: Vec<Habit> = records.into_iter().map(Habit::from_record).collect();
        for habit in &habits {
            if let Err(warning) = habit.validate() {
                tracing::warn!(%warning, "habit will never be due");
            }
        }
        tracing::debug!(count = habits.len(), "habit snapshot replaced");
        *self.habits.write() = habits;
    }

    pub fn validation_warnings(&self) -> Vec<HabitError> {
        self.habits
            .read()
            .iter()
            .filter_map(|habit| habit.validate().err())
            .collect()
    }

    pub fn ledger(&self) -> CompletionLedger {
        self.state.read().ledger.clone()
    }

    pub fn last_checked(&self) -> Option<NaiveDate> {
        self.state.read().last_checked
    }

    /// Runs the day-change hygiene once per local day. Returns whether a
    /// stale entry for today was dropped.
    #[instrument(skip(self))]
    pub fn ensure_rollover(&self) -> bool {
        let (cleared, persisted) = self.roll_over();
        if let Err(err) = persisted {
            tracing::warn!(%err, "failed to persist completion ledger");
        }
        cleared
    }

    fn roll_over(&self) -> (bool, Result<()>) {
        let today = self.today();
        let mut state = self.state.write();
        if state.last_checked == Some(today) {
            return (false, Ok(()));
        }
        let previous = state.last_checked;
        let rolled = std::mem::take(&mut state.ledger).rollover_if_new_day(previous, today);
        state.ledger = rolled.ledger;
        state.last_checked = Some(rolled.last_checked);
        if rolled.cleared {
            tracing::info!(
                previous = ?previous,
                %today,
                "new day detected, dropped stale completions for today"
            );
        }
        (rolled.cleared, self.try_persist(&state.ledger, today))
    }

    pub fn is_completed(&self, id: &HabitId, date: NaiveDate) -> bool {
        self.ensure_rollover();
        self.state.read().ledger.is_completed(id, date)
    }

    pub fn is_completed_today(&self, id: &HabitId) -> bool {
        self.is_completed(id, self.today())
    }

    /// Marks `id` done (or not) on `date`. Returns whether anything changed.
    #[instrument(skip(self))]
    pub fn set_completed(&self, id: &HabitId, date: NaiveDate, desired: bool) -> Result<bool> {
        self.habit(id)?;
        self.ensure_rollover();
        let mut state = self.state.write();
        let changed = state.ledger.set(id, date, desired);
        if changed {
            tracing::debug!(habit_id = %id, %date, desired, "completion updated");
            let today = self.today();
            self.persist(&state.ledger, today);
        }
        Ok(changed)
    }

    /// Applies a completion locally, then hands the upsert to `write`. When
    /// the write fails the local change is undone exactly and the error is
    /// returned.
    #[instrument(skip(self, write))]
    pub fn toggle_optimistic<F>(
        &self,
        id: &HabitId,
        date: NaiveDate,
        desired: bool,
        write: F,
    ) -> Result<()>
    where
        F: FnOnce(&CompletionRecord) -> Result<()>,
    {
        let before = self.is_completed(id, date);
        self.set_completed(id, date, desired)?;
        let record = CompletionRecord {
            habit_id: id.clone(),
            date,
            completed: desired,
        };
        if let Err(err) = write(&record) {
            tracing::warn!(habit_id = %id, %date, %err, "remote write failed, reverting");
            self.set_completed(id, date, before)?;
            return Err(err).with_context(|| format!("failed to record completion for `{id}`"));
        }
        Ok(())
    }

    pub fn streak(&self, id: &HabitId) -> Result<u32> {
        let habit = self.habit(id)?;
        self.ensure_rollover();
        let state = self.state.read();
        Ok(current_streak(&habit, &state.ledger, self.today()))
    }

    pub fn due_today(&self) -> Vec<Habit> {
        let today = self.today();
        self.habits
            .read()
            .iter()
            .filter(|habit| habit.applies_on(today))
            .cloned()
            .collect()
    }

    pub fn progress(&self, id: &HabitId, window: DateWindow) -> Result<Progress> {
        let habit = self.habit(id)?;
        self.ensure_rollover();
        let state = self.state.read();
        Ok(aggregate(&habit, &state.ledger, window))
    }

    pub fn weekly_progress(&self, id: &HabitId) -> Result<Progress> {
        self.progress(id, DateWindow::week_of(self.today()))
    }

    pub fn monthly_progress(&self, id: &HabitId) -> Result<Progress> {
        self.progress(id, DateWindow::month_of(self.today()))
    }

    /// Habits whose progress this week falls in the selected bucket.
    pub fn filter(&self, filter: ProgressFilter) -> Vec<Habit> {
        self.ensure_rollover();
        let week = DateWindow::week_of(self.today());
        let habits = self.habits.read();
        let state = self.state.read();
        filter_habits(&habits, &state.ledger, week, filter, self.thresholds)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.ensure_rollover();
        let today = self.today();
        let week = DateWindow::week_of(today);
        let month = DateWindow::month_of(today);
        let habits = self.habits.read();
        let state = self.state.read();
        let ledger = &state.ledger;

        let summaries = habits
            .iter()
            .map(|habit| {
                let weekly = aggregate(habit, ledger, week);
                HabitSummary {
                    id: habit.id.clone(),
                    name: habit.name.clone(),
                    due_today: habit.applies_on(today),
                    completed_today: ledger.is_completed(&habit.id, today),
                    streak: current_streak(habit, ledger, today),
                    weekly,
                    monthly: aggregate(habit, ledger, month),
                    bucket: classify(weekly.percentage, self.thresholds),
                    history: history(habit, ledger, today, SUMMARY_HISTORY_DAYS)
                        .into_iter()
                        .map(|(_, status)| status)
                        .collect(),
                }
            })
            .collect();

        DashboardSnapshot {
            date: today,
            today: day_progress(&habits, ledger, today),
            habits: summaries,
        }
    }
}

impl HabitSession {
    fn persist(&self, ledger: &CompletionLedger, last_checked: NaiveDate) {
        if let Err(err) = self.try_persist(ledger, last_checked) {
            tracing::warn!(%err, "failed to persist completion ledger");
        }
    }

    fn try_persist(&self, ledger: &CompletionLedger, last_checked: NaiveDate) -> Result<()> {
        match &self.sink {
            Some(sink) => sink.persist(ledger, last_checked),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::FixedClock;
    use crate::recurrence::Recurrence;
    use anyhow::anyhow;
    use std::sync::Arc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: parking_lot::Mutex<Vec<(CompletionLedger, NaiveDate)>>,
    }

    impl LedgerSink for Arc<RecordingSink> {
        fn persist(&self, ledger: &CompletionLedger, last_checked: NaiveDate) -> Result<()> {
            self.calls.lock().push((ledger.clone(), last_checked));
            Ok(())
        }
    }

    struct FailingSink;

    impl LedgerSink for FailingSink {
        fn persist(&self, _: &CompletionLedger, _: NaiveDate) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn session_on(today: NaiveDate) -> HabitSession {
        HabitSession::builder()
            .add_habit(Habit::new("agua", "Agua", Recurrence::Daily))
            .with_clock(Box::new(FixedClock(today)))
            .build()
            .expect("session builds")
    }

    #[test]
    fn build_rolls_over_a_stale_ledger() {
        let id = HabitId::from("agua");
        let mut cached = CompletionLedger::new();
        cached.set(&id, ymd(2024, 6, 1), true);
        cached.set(&id, ymd(2024, 6, 2), true);

        let session = HabitSession::builder()
            .add_habit(Habit::new("agua", "Agua", Recurrence::Daily))
            .restore(cached, Some(ymd(2024, 6, 1)))
            .with_clock(Box::new(FixedClock(ymd(2024, 6, 2))))
            .build()
            .expect("session builds");

        assert_eq!(session.last_checked(), Some(ymd(2024, 6, 2)));
        assert!(!session.is_completed_today(&id));
        assert!(session.is_completed(&id, ymd(2024, 6, 1)));
        assert!(!session.ensure_rollover());
    }

    #[test]
    fn set_completed_notifies_the_sink_only_on_change() {
        let sink = Arc::new(RecordingSink::default());
        let today = ymd(2024, 6, 2);
        let session = HabitSession::builder()
            .add_habit(Habit::new("agua", "Agua", Recurrence::Daily))
            .with_clock(Box::new(FixedClock(today)))
            .with_ledger_sink(Box::new(sink.clone()))
            .build()
            .expect("session builds");
        let baseline = sink.calls.lock().len();

        let id = HabitId::from("agua");
        assert!(session.set_completed(&id, today, true).unwrap());
        assert!(!session.set_completed(&id, today, true).unwrap());
        assert_eq!(sink.calls.lock().len(), baseline + 1);
        assert!(session.is_completed_today(&id));
    }

    #[test]
    fn unknown_habits_are_rejected() {
        let session = session_on(ymd(2024, 6, 2));
        let err = session
            .set_completed(&"nope".into(), ymd(2024, 6, 2), true)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<HabitError>(),
            Some(&HabitError::UnknownHabit("nope".into()))
        );
    }

    #[test]
    fn failed_remote_write_reverts_the_toggle() {
        let today = ymd(2024, 6, 2);
        let session = session_on(today);
        let id = HabitId::from("agua");
        let before = session.ledger();

        let result = session.toggle_optimistic(&id, today, true, |record| {
            assert!(record.completed);
            Err(anyhow!("backend unavailable"))
        });
        assert!(result.is_err());
        assert_eq!(session.ledger(), before);

        session
            .toggle_optimistic(&id, today, true, |_| Ok(()))
            .expect("write succeeds");
        assert!(session.is_completed_today(&id));
    }

    #[test]
    fn snapshot_summarizes_every_habit() {
        let today = ymd(2024, 6, 5);
        let session = session_on(today);
        let id = HabitId::from("agua");
        for day in [ymd(2024, 6, 3), ymd(2024, 6, 4)] {
            session.set_completed(&id, day, true).unwrap();
        }

        let snapshot = session.snapshot();
        assert_eq!(snapshot.date, today);
        assert_eq!(snapshot.today, Progress::from_counts(1, 0));
        let summary = &snapshot.habits[0];
        assert_eq!(summary.streak, 2);
        assert_eq!(summary.weekly, Progress::from_counts(7, 2));
        assert_eq!(summary.monthly, Progress::from_counts(30, 2));
        assert_eq!(summary.bucket, PerformanceBucket::Low);
        assert_eq!(summary.history.len(), SUMMARY_HISTORY_DAYS);
        assert_eq!(
            summary.history[SUMMARY_HISTORY_DAYS - 3..],
            [DayStatus::Completed, DayStatus::Completed, DayStatus::Pending]
        );
        assert_eq!(session.weekly_progress(&id).unwrap(), summary.weekly);
        assert_eq!(session.streak(&id).unwrap(), 2);
        assert_eq!(session.filter(ProgressFilter::All).len(), 1);
        assert!(session
            .filter(ProgressFilter::Only(PerformanceBucket::High))
            .is_empty());
    }

    #[test]
    fn build_fails_when_the_first_write_is_rejected() {
        let err = HabitSession::builder()
            .add_habit(Habit::new("agua", "Agua", Recurrence::Daily))
            .with_clock(Box::new(FixedClock(ymd(2024, 6, 2))))
            .with_ledger_sink(Box::new(FailingSink))
            .build()
            .err()
            .expect("build fails");
        assert!(err.to_string().contains("failed to persist the ledger"));
        assert_eq!(err.root_cause().to_string(), "disk full");
    }

    #[test]
    fn later_sink_failures_keep_the_change_in_memory() {
        let today = ymd(2024, 6, 2);
        let session = HabitSession::builder()
            .add_habit(Habit::new("agua", "Agua", Recurrence::Daily))
            .restore(CompletionLedger::new(), Some(today))
            .with_clock(Box::new(FixedClock(today)))
            .with_ledger_sink(Box::new(FailingSink))
            .build()
            .expect("nothing to persist at start");
        let id = HabitId::from("agua");
        assert!(session.set_completed(&id, today, true).unwrap());
        assert!(session.is_completed_today(&id));
    }

    #[test]
    fn replacing_habits_keeps_ledger_history() {
        let today = ymd(2024, 6, 2);
        let session = session_on(today);
        let id = HabitId::from("agua");
        session.set_completed(&id, today, true).unwrap();

        let records: Vec<HabitRecord> =
            serde_json::from_str(r#"[{"id": "gym", "name": "Gym", "frequency": "diario"}]"#)
                .unwrap();
        session.replace_habits(records);
        assert!(session.habit(&id).is_err());
        assert!(session.habit(&"gym".into()).is_ok());
        assert!(session.ledger().is_completed(&id, today));
    }
}
