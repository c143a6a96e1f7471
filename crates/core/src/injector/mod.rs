//! Injection of matched candidates into the download client, with a
//! stop-loss check that rolls back torrents that start downloading.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::{AddTorrentRequest, DownloadClient, LocalTorrent};
use crate::search::SearchCandidate;

/// Tag applied to every injected torrent so later scans skip it.
pub const INJECT_TAG: &str = "crossseed";

/// Terminal outcome of one injection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// The injected torrent is seeding the existing data.
    Success { hash: String },
    /// The injection was rolled back or never took.
    Failure { reason: String },
    /// The stop-loss fired but the rollback itself failed; the client is
    /// in an unknown state and needs manual intervention.
    RollbackFailed { hash: String, reason: String },
}

/// Adds matched torrents to the client, pointed at already-downloaded data.
pub struct Injector {
    client: Arc<dyn DownloadClient>,
    split_mode: bool,
}

impl Injector {
    pub fn new(client: Arc<dyn DownloadClient>, split_mode: bool) -> Self {
        Self { client, split_mode }
    }

    /// Inject one candidate for a local torrent and verify it took.
    ///
    /// In split mode the torrent is pinned to the local save path with
    /// relocation disabled, so the client re-checks the existing data
    /// instead of downloading. Otherwise the client's default save path
    /// applies. A single post-add state probe decides the outcome:
    /// anything downloading means the data did not line up and the
    /// injection is rolled back.
    pub async fn inject(
        &self,
        local: &LocalTorrent,
        candidate: &SearchCandidate,
    ) -> InjectionOutcome {
        let mut request = AddTorrentRequest::new(candidate.source_url.clone()).with_tag(INJECT_TAG);
        if self.split_mode {
            request = request
                .with_save_path(local.save_path.clone())
                .with_no_relocate();
        }

        let added = match self.client.add_torrent(request).await {
            Ok(added) => added,
            Err(e) => {
                warn!(
                    local = %local.name,
                    site = %candidate.site,
                    error = %e,
                    "Failed to add torrent"
                );
                return InjectionOutcome::Failure {
                    reason: format!("add failed: {}", e),
                };
            }
        };

        info!(
            local = %local.name,
            site = %candidate.site,
            hash = %added.hash,
            "Injected torrent, probing state"
        );

        match self.client.get_state(&added.hash).await {
            Ok(state) if state.is_downloading() => {
                warn!(
                    hash = %added.hash,
                    site = %candidate.site,
                    state = state.as_str(),
                    "Injected torrent is downloading, rolling back"
                );
                self.rollback(local, &added.hash).await
            }
            Ok(state) => {
                info!(
                    hash = %added.hash,
                    site = %candidate.site,
                    state = state.as_str(),
                    "Injection verified"
                );
                InjectionOutcome::Success { hash: added.hash }
            }
            Err(e) => {
                warn!(hash = %added.hash, error = %e, "State probe failed, rolling back");
                self.rollback(local, &added.hash).await
            }
        }
    }

    /// Remove a bad injection from the client.
    ///
    /// Files are deleted only when the injected torrent landed outside the
    /// original save path. In split mode the injected torrent shares the
    /// original's directory and the client cannot tell its files apart
    /// from the seeded data, so deletion is skipped and escalated.
    async fn rollback(&self, local: &LocalTorrent, hash: &str) -> InjectionOutcome {
        let delete_files = if self.split_mode {
            error!(
                hash = hash,
                save_path = %local.save_path.display(),
                "Split mode rollback leaves files on disk, clean up manually"
            );
            false
        } else {
            true
        };

        match self.client.remove_torrent(hash, delete_files).await {
            Ok(()) => InjectionOutcome::Failure {
                reason: "post-injection-mismatch".to_string(),
            },
            Err(e) => {
                error!(
                    hash = hash,
                    error = %e,
                    "Rollback failed, torrent left in unknown state"
                );
                InjectionOutcome::RollbackFailed {
                    hash: hash.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

}
