//! SQLite-backed ledger implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::warn;

use super::{LedgerEntry, LedgerError, LedgerStore};

/// SQLite-backed ledger.
///
/// Entries are stored one row per torrent hash with the variant payload as
/// tagged JSON, so the "one variant per key" invariant holds structurally.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at the given path.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                hash TEXT PRIMARY KEY,
                entry TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_updated_at ON ledger(updated_at);
            "#,
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    fn parse_entry(hash: &str, json: &str) -> Result<LedgerEntry, LedgerError> {
        serde_json::from_str(json).map_err(|e| LedgerError::CorruptEntry {
            hash: hash.to_string(),
            detail: e.to_string(),
        })
    }

    fn write_entry(
        conn: &Connection,
        hash: &str,
        entry: &LedgerEntry,
    ) -> Result<(), LedgerError> {
        let json = serde_json::to_string(entry).map_err(|e| LedgerError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO ledger (hash, entry, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(hash) DO UPDATE SET entry = excluded.entry, updated_at = excluded.updated_at",
            params![hash, json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(())
    }

    fn lookup_locked(conn: &Connection, hash: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut stmt = conn
            .prepare("SELECT entry FROM ledger WHERE hash = ?")
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut rows = stmt
            .query(params![hash])
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        match rows.next().map_err(|e| LedgerError::Database(e.to_string()))? {
            Some(row) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| LedgerError::Database(e.to_string()))?;
                Ok(Some(Self::parse_entry(hash, &json)?))
            }
            None => Ok(None),
        }
    }
}

impl LedgerStore for SqliteLedger {
    fn lookup(&self, hash: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        Self::lookup_locked(&conn, hash)
    }

    fn record_success(
        &self,
        hash: &str,
        source_site: Option<&str>,
        target_sites: &[String],
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut targets: Vec<String> = target_sites.to_vec();
        if let Some(LedgerEntry::Success {
            target_sites: existing,
            ..
        }) = Self::lookup_locked(&conn, hash)?
        {
            for site in existing {
                if !targets.contains(&site) {
                    targets.push(site);
                }
            }
        }

        let entry = LedgerEntry::Success {
            source_site: source_site.map(str::to_string),
            target_sites: targets,
            recorded_at: Utc::now(),
        };
        Self::write_entry(&conn, hash, &entry)
    }

    fn record_failure(
        &self,
        hash: &str,
        source_site: Option<&str>,
        reason: &str,
    ) -> Result<u32, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let retry_count = match Self::lookup_locked(&conn, hash)? {
            Some(LedgerEntry::Success { .. }) => {
                // Success is terminal; never downgrade.
                warn!(hash, reason, "ignoring failure record for successful cross-seed");
                return Ok(0);
            }
            Some(LedgerEntry::Failed { retry_count, .. }) => retry_count + 1,
            None => 1,
        };

        let entry = LedgerEntry::Failed {
            source_site: source_site.map(str::to_string),
            reason: reason.to_string(),
            retry_count,
            last_attempt_at: Utc::now(),
        };
        Self::write_entry(&conn, hash, &entry)?;
        Ok(retry_count)
    }

    fn all(&self) -> Result<Vec<(String, LedgerEntry)>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT hash, entry FROM ledger ORDER BY hash")
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let hash: String = row.get(0)?;
                let json: String = row.get(1)?;
                Ok((hash, json))
            })
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (hash, json) = row.map_err(|e| LedgerError::Database(e.to_string()))?;
            let entry = Self::parse_entry(&hash, &json)?;
            entries.push((hash, entry));
        }
        Ok(entries)
    }

    fn success_count_for_site(&self, site: &str) -> Result<u64, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ledger, json_each(json_extract(ledger.entry, '$.target_sites'))
                 WHERE json_extract(ledger.entry, '$.type') = 'success' AND json_each.value = ?",
                params![site],
                |row| row.get(0),
            )
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    fn expire_failed(
        &self,
        max_retry: u32,
        older_than: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let removed = conn
            .execute(
                "DELETE FROM ledger
                 WHERE json_extract(entry, '$.type') = 'failed'
                   AND json_extract(entry, '$.retry_count') >= ?
                   AND json_extract(entry, '$.last_attempt_at') < ?",
                params![max_retry, older_than.to_rfc3339()],
            )
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(removed)
    }

    fn clear(&self) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM ledger", [])
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_ledger() -> SqliteLedger {
        SqliteLedger::in_memory().unwrap()
    }

    #[test]
    fn test_lookup_empty() {
        let ledger = create_test_ledger();
        assert!(ledger.lookup("abc123").unwrap().is_none());
    }

    #[test]
    fn test_record_success_and_lookup() {
        let ledger = create_test_ledger();
        ledger
            .record_success("abc123", Some("alpha"), &["beta".to_string()])
            .unwrap();

        let entry = ledger.lookup("abc123").unwrap().unwrap();
        match entry {
            LedgerEntry::Success {
                source_site,
                target_sites,
                ..
            } => {
                assert_eq!(source_site.as_deref(), Some("alpha"));
                assert_eq!(target_sites, vec!["beta"]);
            }
            other => panic!("Expected success entry, got {:?}", other),
        }
    }

    #[test]
    fn test_record_success_merges_target_sites() {
        let ledger = create_test_ledger();
        ledger
            .record_success("abc123", Some("alpha"), &["beta".to_string()])
            .unwrap();
        ledger
            .record_success("abc123", Some("alpha"), &["gamma".to_string()])
            .unwrap();

        let entry = ledger.lookup("abc123").unwrap().unwrap();
        match entry {
            LedgerEntry::Success { target_sites, .. } => {
                assert!(target_sites.contains(&"beta".to_string()));
                assert!(target_sites.contains(&"gamma".to_string()));
            }
            other => panic!("Expected success entry, got {:?}", other),
        }
    }

    #[test]
    fn test_record_failure_increments_retry_count() {
        let ledger = create_test_ledger();

        assert_eq!(
            ledger.record_failure("abc123", None, "no-candidates").unwrap(),
            1
        );
        assert_eq!(
            ledger.record_failure("abc123", None, "size-mismatch").unwrap(),
            2
        );
        assert_eq!(
            ledger.record_failure("abc123", None, "no-candidates").unwrap(),
            3
        );

        let entry = ledger.lookup("abc123").unwrap().unwrap();
        match entry {
            LedgerEntry::Failed {
                retry_count,
                reason,
                ..
            } => {
                assert_eq!(retry_count, 3);
                assert_eq!(reason, "no-candidates");
            }
            other => panic!("Expected failed entry, got {:?}", other),
        }
    }

    #[test]
    fn test_success_is_never_downgraded() {
        let ledger = create_test_ledger();
        ledger
            .record_success("abc123", None, &["beta".to_string()])
            .unwrap();
        ledger.record_failure("abc123", None, "size-mismatch").unwrap();

        assert!(ledger.lookup("abc123").unwrap().unwrap().is_success());
    }

    #[test]
    fn test_failed_transitions_to_success() {
        let ledger = create_test_ledger();
        ledger.record_failure("abc123", None, "no-candidates").unwrap();
        ledger
            .record_success("abc123", None, &["beta".to_string()])
            .unwrap();

        assert!(ledger.lookup("abc123").unwrap().unwrap().is_success());
    }

    #[test]
    fn test_is_eligible() {
        let ledger = create_test_ledger();

        // No entry: eligible.
        assert!(ledger.is_eligible("abc123", 3).unwrap());

        // Failed below ceiling: eligible.
        ledger.record_failure("abc123", None, "no-candidates").unwrap();
        ledger.record_failure("abc123", None, "no-candidates").unwrap();
        assert!(ledger.is_eligible("abc123", 3).unwrap());

        // Failed at ceiling: not eligible.
        ledger.record_failure("abc123", None, "no-candidates").unwrap();
        assert!(!ledger.is_eligible("abc123", 3).unwrap());

        // Success: terminal.
        ledger
            .record_success("def456", None, &["beta".to_string()])
            .unwrap();
        assert!(!ledger.is_eligible("def456", 3).unwrap());
    }

    #[test]
    fn test_success_count_for_site() {
        let ledger = create_test_ledger();
        ledger
            .record_success("h1", None, &["beta".to_string(), "gamma".to_string()])
            .unwrap();
        ledger
            .record_success("h2", None, &["beta".to_string()])
            .unwrap();
        ledger.record_failure("h3", None, "no-candidates").unwrap();

        assert_eq!(ledger.success_count_for_site("beta").unwrap(), 2);
        assert_eq!(ledger.success_count_for_site("gamma").unwrap(), 1);
        assert_eq!(ledger.success_count_for_site("delta").unwrap(), 0);
    }

    #[test]
    fn test_expire_failed_removes_terminal_entries() {
        let ledger = create_test_ledger();
        for _ in 0..3 {
            ledger.record_failure("old", None, "no-candidates").unwrap();
        }
        ledger.record_failure("fresh", None, "no-candidates").unwrap();

        // Cutoff in the future: "old" is past the ceiling and older than it.
        let removed = ledger
            .expire_failed(3, Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(ledger.lookup("old").unwrap().is_none());
        assert!(ledger.lookup("fresh").unwrap().is_some());

        // Cutoff in the past: nothing to remove.
        let removed = ledger
            .expire_failed(1, Utc::now() - Duration::hours(1))
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_clear_wipes_everything() {
        let ledger = create_test_ledger();
        ledger
            .record_success("h1", None, &["beta".to_string()])
            .unwrap();
        ledger.record_failure("h2", None, "no-candidates").unwrap();

        ledger.clear().unwrap();
        assert!(ledger.all().unwrap().is_empty());
        assert!(ledger.is_eligible("h1", 3).unwrap());
    }

    #[test]
    fn test_file_based_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = SqliteLedger::new(&path).unwrap();
            ledger
                .record_success("h1", Some("alpha"), &["beta".to_string()])
                .unwrap();
        }

        let ledger = SqliteLedger::new(&path).unwrap();
        assert!(ledger.lookup("h1").unwrap().unwrap().is_success());
    }
}
