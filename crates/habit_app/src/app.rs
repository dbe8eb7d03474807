use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use habit_core::{
    cache::JsonFileCache,
    date::{format_date, parse_date, Clock, FixedClock, SystemClock},
    performance::{ProgressFilter, ProgressThresholds},
    service::DashboardSnapshot,
    HabitRecord, HabitSession,
};
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) source: Option<PathBuf>,
    pub(crate) cache: Option<PathBuf>,
    pub(crate) today: Option<NaiveDate>,
    pub(crate) filter: ProgressFilter,
    pub(crate) thresholds: ProgressThresholds,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("HABIT_SOURCE") {
            config.source = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("HABIT_CACHE") {
            config.cache = Some(PathBuf::from(path));
        }
        if let Ok(value) = std::env::var("HABIT_TODAY") {
            match parse_date(value.trim()) {
                Ok(date) => config.today = Some(date),
                Err(err) => warn!(%err, "ignoring HABIT_TODAY"),
            }
        }
        if let Ok(value) = std::env::var("HABIT_FILTER") {
            match value.parse::<ProgressFilter>() {
                Ok(filter) => config.filter = filter,
                Err(err) => warn!(%err, "ignoring HABIT_FILTER"),
            }
        }
        let high = read_percent("HABIT_THRESHOLD_HIGH");
        let medium = read_percent("HABIT_THRESHOLD_MEDIUM");
        config.apply_thresholds(high, medium);
        Ok(config)
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache = Some(path.into());
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_filter(mut self, filter: ProgressFilter) -> Self {
        self.filter = filter;
        self
    }

    pub(crate) fn apply_thresholds(&mut self, high: Option<u32>, medium: Option<u32>) {
        let candidate = ProgressThresholds {
            high: high.unwrap_or(self.thresholds.high),
            medium: medium.unwrap_or(self.thresholds.medium),
        };
        if candidate.medium > candidate.high {
            warn!(
                high = candidate.high,
                medium = candidate.medium,
                "medium threshold above high threshold, keeping defaults"
            );
            return;
        }
        self.thresholds = candidate;
    }

    fn clock(&self) -> Box<dyn Clock> {
        match self.today {
            Some(date) => Box::new(FixedClock(date)),
            None => Box::new(SystemClock),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: None,
            cache: None,
            today: None,
            filter: ProgressFilter::All,
            thresholds: ProgressThresholds::default(),
        }
    }
}

fn read_percent(key: &str) -> Option<u32> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(value) if value <= 100 => Some(value),
        _ => {
            warn!(key, value = %raw, "ignoring threshold outside 0..=100");
            None
        }
    }
}

/// Reads a habit snapshot: a JSON array of habit records.
pub fn load_habit_records(path: &Path) -> Result<Vec<HabitRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read habits from `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("malformed habit snapshot `{}`", path.display()))
}

pub fn build_session(config: &AppConfig) -> Result<HabitSession> {
    let records = match &config.source {
        Some(path) => load_habit_records(path)?,
        None => {
            warn!("HABIT_SOURCE not set, starting without habits");
            Vec::new()
        }
    };
    info!(count = records.len(), "loaded habits");

    let mut builder = HabitSession::builder()
        .add_records(records)
        .with_clock(config.clock())
        .with_thresholds(config.thresholds);
    if let Some(path) = &config.cache {
        let cache = JsonFileCache::new(path);
        let cached = cache.load()?;
        builder = builder
            .restore(cached.completed, cached.last_checked)
            .with_ledger_sink(Box::new(cache));
    }
    builder.build()
}

pub fn render_report(session: &HabitSession, filter: ProgressFilter) -> String {
    let snapshot: DashboardSnapshot = session.snapshot();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} · {}/{} due habits done ({}%)",
        format_date(snapshot.date),
        snapshot.today.completed_count,
        snapshot.today.due_count,
        snapshot.today.percentage
    );
    for summary in snapshot
        .habits
        .iter()
        .filter(|summary| filter.matches(summary.bucket))
    {
        let marker = match (summary.due_today, summary.completed_today) {
            (_, true) => "[x]",
            (true, false) => "[ ]",
            (false, false) => " - ",
        };
        let strip: String = summary.history.iter().map(|status| status.symbol()).collect();
        let _ = writeln!(
            out,
            "{marker} {name} · streak {streak} day{plural} · week {week}% · month {month}% · {bucket} · {strip}",
            name = summary.name,
            streak = summary.streak,
            plural = if summary.streak == 1 { "" } else { "s" },
            week = summary.weekly.percentage,
            month = summary.monthly.percentage,
            bucket = summary.bucket.label(),
        );
    }
    out
}

pub fn run(config: AppConfig) -> Result<()> {
    let session = build_session(&config)?;
    print!("{}", render_report(&session, config.filter));
    Ok(())
}
