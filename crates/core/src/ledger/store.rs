//! Ledger storage trait.

use chrono::{DateTime, Utc};

use super::{LedgerEntry, LedgerError};

/// Trait for ledger storage backends.
///
/// Every mutation is persisted synchronously before the call returns.
/// Implementations must be safe for concurrent access across distinct hashes;
/// the reconciler guarantees a given hash is touched by at most one worker
/// per cycle.
pub trait LedgerStore: Send + Sync {
    /// Get the entry for a torrent hash, if any.
    fn lookup(&self, hash: &str) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Record a successful cross-seed. Replaces any previous entry for the
    /// hash; an existing success has its target sites merged in.
    fn record_success(
        &self,
        hash: &str,
        source_site: Option<&str>,
        target_sites: &[String],
    ) -> Result<(), LedgerError>;

    /// Record a failed attempt, initializing the retry count to 1 or
    /// incrementing it. A success entry is never downgraded; recording a
    /// failure over one is a logged no-op. Returns the retry count after
    /// the write.
    fn record_failure(
        &self,
        hash: &str,
        source_site: Option<&str>,
        reason: &str,
    ) -> Result<u32, LedgerError>;

    /// All entries, ordered by hash. Used for history display and
    /// per-site success counting.
    fn all(&self) -> Result<Vec<(String, LedgerEntry)>, LedgerError>;

    /// Number of success entries that include the given target site.
    /// Used by the matcher to spread load across sites on score ties.
    fn success_count_for_site(&self, site: &str) -> Result<u64, LedgerError>;

    /// Drop failed entries at or past the retry ceiling whose last attempt
    /// is older than the cutoff. Returns the number of entries removed.
    fn expire_failed(
        &self,
        max_retry: u32,
        older_than: DateTime<Utc>,
    ) -> Result<usize, LedgerError>;

    /// Wipe the entire ledger (manual cache clear).
    fn clear(&self) -> Result<(), LedgerError>;

    /// A torrent is eligible when it has no entry, or a failed entry with
    /// retries remaining. Success entries are terminal.
    fn is_eligible(&self, hash: &str, max_retry: u32) -> Result<bool, LedgerError> {
        match self.lookup(hash)? {
            None => Ok(true),
            Some(LedgerEntry::Success { .. }) => Ok(false),
            Some(LedgerEntry::Failed { retry_count, .. }) => Ok(retry_count < max_retry),
        }
    }
}
