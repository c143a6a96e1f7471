//! Fan-out search across target sites with pacing and retries.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ReconcileConfig;
use crate::metadata::NormalizedMetadata;

use super::{build_query, SearchCandidate, SiteRegistry};

/// Runs one keyword query against every target site, bounded by a
/// concurrency cap, with a randomized pause before each request.
pub struct SearchOrchestrator {
    registry: Arc<dyn SiteRegistry>,
    semaphore: Arc<Semaphore>,
    cooldown_min_secs: u64,
    cooldown_max_secs: u64,
    max_retry: u32,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<dyn SiteRegistry>, config: &ReconcileConfig) -> Self {
        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(config.search_workers)),
            cooldown_min_secs: config.cooldown_min_secs,
            cooldown_max_secs: config.cooldown_max_secs,
            max_retry: config.max_retry,
        }
    }

    /// Pause for a random duration in the configured cooldown window.
    ///
    /// The jitter keeps bursts of per-site requests from looking like
    /// automated scraping at the aggregator.
    async fn cooldown(&self) {
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.cooldown_min_secs * 1000..=self.cooldown_max_secs * 1000)
        };
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    /// Query one site, retrying transient failures.
    async fn search_site(&self, site: &str, query: &str) -> Vec<SearchCandidate> {
        for attempt in 1..=self.max_retry.max(1) {
            self.cooldown().await;

            match self.registry.search(site, query).await {
                Ok(candidates) => {
                    debug!(
                        site = site,
                        results = candidates.len(),
                        attempt = attempt,
                        "Site search succeeded"
                    );
                    return candidates;
                }
                Err(e) if e.is_transient() && attempt < self.max_retry.max(1) => {
                    debug!(site = site, error = %e, attempt = attempt, "Retrying site search");
                }
                Err(e) => {
                    warn!(site = site, error = %e, "Site search failed, skipping site");
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    /// Search every target site for a normalized torrent.
    ///
    /// Site failures degrade to fewer candidates, never to an error; a
    /// cycle where every site is down yields an empty list.
    pub async fn search(&self, metadata: &NormalizedMetadata) -> Vec<SearchCandidate> {
        let query = build_query(metadata);
        let sites = self.registry.target_sites();

        debug!(query = %query, sites = sites.len(), "Starting site fan-out");

        let searches: Vec<_> = sites
            .iter()
            .map(|site| {
                let site = site.clone();
                let query = query.clone();
                let semaphore = Arc::clone(&self.semaphore);
                async move {
                    // Semaphore is never closed, acquire cannot fail.
                    let _permit = semaphore.acquire().await;
                    self.search_site(&site, &query).await
                }
            })
            .collect();

        let results = futures::future::join_all(searches).await;
        let candidates: Vec<SearchCandidate> = results.into_iter().flatten().collect();

        debug!(query = %query, candidates = candidates.len(), "Site fan-out complete");
        candidates
    }
}
