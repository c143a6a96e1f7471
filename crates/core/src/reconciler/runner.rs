//! The reconciliation cycle: scan, search, validate, inject, record.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{DownloadClient, LocalTorrent};
use crate::config::ReconcileConfig;
use crate::injector::{InjectionOutcome, Injector};
use crate::ledger::LedgerStore;
use crate::matcher::{MatchResult, Matcher};
use crate::metadata::Normalizer;
use crate::search::{SearchOrchestrator, SiteRegistry};

use super::scanner::Scanner;
use super::types::{CrossSeedEvent, CycleSummary, EventOutcome, ReconcileError};

/// Per-torrent result flowing out of the worker pool.
struct WorkItem {
    matched: bool,
    event: CrossSeedEvent,
}

/// Drives cross-seeding cycles over the wired collaborators.
pub struct Reconciler {
    client: Arc<dyn DownloadClient>,
    ledger: Arc<dyn LedgerStore>,
    registry: Arc<dyn SiteRegistry>,
    scanner: Scanner,
    normalizer: Normalizer,
    searcher: SearchOrchestrator,
    matcher: Matcher,
    injector: Injector,
    config: ReconcileConfig,
    /// Overlap guard; held for the duration of a cycle.
    cycle_lock: Mutex<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn DownloadClient>,
        ledger: Arc<dyn LedgerStore>,
        registry: Arc<dyn SiteRegistry>,
        normalizer: Normalizer,
        config: ReconcileConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            scanner: Scanner::new(&config),
            searcher: SearchOrchestrator::new(Arc::clone(&registry), &config),
            matcher: Matcher::new(config.size_tolerance_bytes()),
            injector: Injector::new(Arc::clone(&client), config.split_mode),
            client,
            ledger,
            registry,
            normalizer,
            config,
            cycle_lock: Mutex::new(()),
            shutdown_tx,
        }
    }

    /// Sender used to request a graceful stop. In-flight torrents finish
    /// their current step; not-yet-started torrents stay eligible for the
    /// next cycle.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run one full reconciliation cycle.
    ///
    /// Rejects overlapping invocations; a second caller gets
    /// `CycleInProgress` instead of a queued cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary, ReconcileError> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| ReconcileError::CycleInProgress)?;

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(cycle_id = %cycle_id, "Starting reconciliation cycle");

        if let Some(days) = self.config.failed_entry_ttl_days {
            let cutoff = Utc::now() - chrono::Duration::days(days as i64);
            let expired = self.ledger.expire_failed(self.config.max_retry, cutoff)?;
            if expired > 0 {
                info!(expired = expired, "Expired exhausted failure entries");
            }
        }

        let torrents = self.scanner.scan(&self.client, &self.ledger).await?;
        let scanned = torrents.len();

        // Snapshot per-site success counts once; the matcher uses them to
        // spread score ties across less-served sites.
        let mut site_success_counts: HashMap<String, u64> = HashMap::new();
        for site in self.registry.target_sites() {
            let count = self.ledger.success_count_for_site(&site)?;
            site_success_counts.insert(site, count);
        }

        let stopping = Arc::new(AtomicBool::new(false));
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let stop_flag = Arc::clone(&stopping);
        let watcher = tokio::spawn(async move {
            if shutdown_rx.recv().await.is_ok() {
                stop_flag.store(true, Ordering::SeqCst);
            }
        });

        let items: Vec<WorkItem> = stream::iter(torrents)
            .map(|torrent| {
                let counts = &site_success_counts;
                let stopping = Arc::clone(&stopping);
                async move { self.process_torrent(torrent, counts, &stopping).await }
            })
            .buffer_unordered(self.config.worker_pool)
            .try_collect::<Vec<Option<WorkItem>>>()
            .await?
            .into_iter()
            .flatten()
            .collect();

        watcher.abort();

        let matched = items.iter().filter(|i| i.matched).count();
        let events: Vec<CrossSeedEvent> = items.into_iter().map(|i| i.event).collect();
        let injected = events
            .iter()
            .filter(|e| e.outcome == EventOutcome::Injected)
            .count();
        let failed = events.len() - injected;

        let summary = CycleSummary {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            scanned,
            matched,
            injected,
            failed,
            events,
        };
        info!(
            cycle_id = %cycle_id,
            scanned = summary.scanned,
            matched = summary.matched,
            injected = summary.injected,
            failed = summary.failed,
            "Cycle complete"
        );
        Ok(summary)
    }

    /// Run one torrent through normalize, search, validate, inject, record.
    ///
    /// Returns `None` when a shutdown request stopped the torrent before it
    /// reached a terminal outcome; nothing is written and the torrent stays
    /// eligible.
    async fn process_torrent(
        &self,
        torrent: LocalTorrent,
        site_success_counts: &HashMap<String, u64>,
        stopping: &AtomicBool,
    ) -> Result<Option<WorkItem>, ReconcileError> {
        if stopping.load(Ordering::SeqCst) {
            debug!(name = %torrent.name, "Shutdown requested, leaving torrent for next cycle");
            return Ok(None);
        }

        let metadata = self.normalizer.normalize(&torrent).await;
        let candidates = self.searcher.search(&metadata).await;

        let result = self
            .matcher
            .validate(&torrent, &metadata, candidates, site_success_counts);

        let candidate = match result {
            MatchResult::Matched { candidate, score } => {
                debug!(
                    name = %torrent.name,
                    site = %candidate.site,
                    score = score,
                    "Validated cross-seed candidate"
                );
                candidate
            }
            MatchResult::NoMatch(reason) => {
                let retry_count = self.ledger.record_failure(
                    &torrent.hash,
                    torrent.source_site.as_deref(),
                    reason.as_str(),
                )?;
                debug!(
                    name = %torrent.name,
                    reason = reason.as_str(),
                    retry_count = retry_count,
                    "No acceptable candidate"
                );
                return Ok(Some(WorkItem {
                    matched: false,
                    event: self.event(&torrent, Vec::new(), EventOutcome::Failed, Some(reason.as_str())),
                }));
            }
        };

        if stopping.load(Ordering::SeqCst) {
            debug!(name = %torrent.name, "Shutdown requested before injection, leaving torrent");
            return Ok(None);
        }

        let target = candidate.site.clone();
        let outcome = self.injector.inject(&torrent, &candidate).await;
        let item = match outcome {
            InjectionOutcome::Success { hash } => {
                self.ledger.record_success(
                    &torrent.hash,
                    torrent.source_site.as_deref(),
                    std::slice::from_ref(&target),
                )?;
                info!(
                    name = %torrent.name,
                    site = %target,
                    injected_hash = %hash,
                    "Cross-seed recorded"
                );
                WorkItem {
                    matched: true,
                    event: self.event(&torrent, vec![target], EventOutcome::Injected, None),
                }
            }
            InjectionOutcome::Failure { reason } => {
                self.ledger.record_failure(
                    &torrent.hash,
                    torrent.source_site.as_deref(),
                    &reason,
                )?;
                WorkItem {
                    matched: true,
                    event: self.event(&torrent, vec![target], EventOutcome::Failed, Some(&reason)),
                }
            }
            InjectionOutcome::RollbackFailed { hash, reason } => {
                self.ledger.record_failure(
                    &torrent.hash,
                    torrent.source_site.as_deref(),
                    "rollback-failed",
                )?;
                warn!(
                    name = %torrent.name,
                    injected_hash = %hash,
                    error = %reason,
                    "Rollback failed, manual cleanup required"
                );
                WorkItem {
                    matched: true,
                    event: self.event(
                        &torrent,
                        vec![target],
                        EventOutcome::RollbackFailed,
                        Some("rollback-failed"),
                    ),
                }
            }
        };
        Ok(Some(item))
    }

    fn event(
        &self,
        torrent: &LocalTorrent,
        target_sites: Vec<String>,
        outcome: EventOutcome,
        reason: Option<&str>,
    ) -> CrossSeedEvent {
        CrossSeedEvent {
            hash: torrent.hash.clone(),
            name: torrent.name.clone(),
            source_site: torrent.source_site.clone(),
            target_sites,
            outcome,
            reason: reason.map(|r| r.to_string()),
            timestamp: Utc::now(),
        }
    }
}
