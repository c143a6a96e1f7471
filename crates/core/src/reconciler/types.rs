//! Cycle summaries, events, and errors for the reconciliation loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::client::ClientError;
use crate::ledger::LedgerError;

/// Errors that abort a reconciliation cycle.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A cycle is already running; overlapping invocations are rejected.
    #[error("A reconciliation cycle is already in progress")]
    CycleInProgress,

    #[error("Download client error: {0}")]
    Client(#[from] ClientError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Terminal outcome of one torrent within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Injected,
    Failed,
    RollbackFailed,
}

/// One per-torrent terminal outcome, suitable for notification rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSeedEvent {
    /// Local torrent info hash.
    pub hash: String,
    /// Display name of the local torrent.
    pub name: String,
    /// Site the torrent originally came from, if known.
    pub source_site: Option<String>,
    /// Sites the torrent was injected for.
    pub target_sites: Vec<String>,
    pub outcome: EventOutcome,
    /// Failure reason, absent on injection success.
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate result of one reconciliation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Eligible torrents that entered the pipeline.
    pub scanned: usize,
    /// Torrents with an accepted candidate.
    pub matched: usize,
    /// Torrents injected and verified seeding.
    pub injected: usize,
    /// Torrents that ended the cycle with a failure entry.
    pub failed: usize,
    pub events: Vec<CrossSeedEvent>,
}
