//! Ledger entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// A ledger failure is fatal for the whole reconciliation cycle: the cycle
/// aborts rather than risk partial writes.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger database error: {0}")]
    Database(String),

    #[error("Corrupt ledger entry for {hash}: {detail}")]
    CorruptEntry { hash: String, detail: String },
}

/// Durable outcome of a cross-seed attempt, keyed by local torrent hash.
///
/// A hash holds at most one variant at a time. `Failed` may transition to
/// `Success` on a later retry; `Success` is never downgraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    Success {
        /// Site the torrent originally came from, if known.
        source_site: Option<String>,
        /// Sites the torrent was successfully cross-seeded to.
        target_sites: Vec<String>,
        recorded_at: DateTime<Utc>,
    },
    Failed {
        source_site: Option<String>,
        /// Failure classification ("no-candidates", "size-mismatch", ...).
        reason: String,
        /// Attempts made so far; starts at 1.
        retry_count: u32,
        last_attempt_at: DateTime<Utc>,
    },
}

impl LedgerEntry {
    /// String form of the variant, used for filtering and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEntry::Success { .. } => "success",
            LedgerEntry::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LedgerEntry::Success { .. })
    }
}
