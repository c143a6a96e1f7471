//! Scan the download client for cross-seed candidates.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::client::{DownloadClient, LocalTorrent};
use crate::config::ReconcileConfig;
use crate::injector::INJECT_TAG;
use crate::ledger::LedgerStore;
use crate::metadata::NameParser;

use super::ReconcileError;

/// Produces the work list for one cycle: completed torrents minus
/// exclusions, ledger-settled entries, and same-release duplicates.
pub struct Scanner {
    parser: NameParser,
    exclude_tags: Vec<String>,
    max_retry: u32,
}

impl Scanner {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            parser: NameParser::new(),
            exclude_tags: config.exclude_tags.clone(),
            max_retry: config.max_retry,
        }
    }

    /// List eligible torrents, at most one per release per source site.
    pub async fn scan(
        &self,
        client: &Arc<dyn DownloadClient>,
        ledger: &Arc<dyn LedgerStore>,
    ) -> Result<Vec<LocalTorrent>, ReconcileError> {
        let completed = client.list_completed().await?;
        let total = completed.len();

        let mut seen_releases: HashSet<(String, Option<u16>, Option<String>)> = HashSet::new();
        let mut eligible = Vec::new();

        for torrent in completed {
            if self.is_excluded(&torrent) {
                debug!(name = %torrent.name, "Skipping torrent with excluded tag");
                continue;
            }
            if !ledger.is_eligible(&torrent.hash, self.max_retry)? {
                debug!(name = %torrent.name, hash = %torrent.hash, "Skipping settled torrent");
                continue;
            }

            let (title, year) = self.parser.extract_title_year(&torrent.name);
            let key = (
                self.parser.canonicalize(&title),
                year,
                torrent.source_site.clone(),
            );
            if !seen_releases.insert(key) {
                debug!(name = %torrent.name, "Skipping duplicate of already-queued release");
                continue;
            }

            eligible.push(torrent);
        }

        debug!(total = total, eligible = eligible.len(), "Scan complete");
        Ok(eligible)
    }

    /// Injected torrents carry the marker tag and are never re-scanned;
    /// user-configured exclusions apply on top.
    fn is_excluded(&self, torrent: &LocalTorrent) -> bool {
        torrent
            .tags
            .iter()
            .any(|tag| tag == INJECT_TAG || self.exclude_tags.iter().any(|ex| ex == tag))
    }
}
