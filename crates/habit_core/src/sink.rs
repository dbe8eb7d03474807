use anyhow::Result;
use chrono::NaiveDate;

use crate::ledger::CompletionLedger;

/// Persistence adapters (local cache, remote mirror) implement this trait.
/// The session calls it after every change to its ledger.
pub trait LedgerSink: Send + Sync {
    fn persist(&self, ledger: &CompletionLedger, last_checked: NaiveDate) -> Result<()>;
}
