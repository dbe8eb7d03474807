use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{ledger::CompletionLedger, sink::LedgerSink};

/// What the local cache keeps between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedLedger {
    #[serde(default)]
    pub completed: CompletionLedger,
    #[serde(default)]
    pub last_checked: Option<NaiveDate>,
}

/// Ledger cache stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache. A missing file is an empty cache.
    pub fn load(&self) -> Result<CachedLedger> {
        if !self.path.exists() {
            return Ok(CachedLedger::default());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read ledger cache `{}`", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed ledger cache `{}`", self.path.display()))
    }

    pub fn store(&self, cached: &CachedLedger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(cached)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("failed to write ledger cache `{}`", self.path.display()))
    }
}

impl LedgerSink for JsonFileCache {
    fn persist(&self, ledger: &CompletionLedger, last_checked: NaiveDate) -> Result<()> {
        self.store(&CachedLedger {
            completed: ledger.clone(),
            last_checked: Some(last_checked),
        })
    }
}
