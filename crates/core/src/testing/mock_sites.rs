//! Mock site registry for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::search::{SearchCandidate, SiteError, SiteRegistry};

#[derive(Debug, Default)]
struct MockSiteState {
    results: Vec<SearchCandidate>,
    /// How many of the next searches fail.
    failures_remaining: u32,
    /// Whether injected failures are transient.
    fail_transient: bool,
    search_count: u32,
}

/// Mock implementation of the SiteRegistry trait.
///
/// Per-site canned results, per-site injectable failures, and a call
/// counter for retry assertions.
pub struct MockSiteRegistry {
    sites: Vec<String>,
    state: Arc<RwLock<HashMap<String, MockSiteState>>>,
}

impl MockSiteRegistry {
    pub fn new(sites: Vec<String>) -> Self {
        let state = sites
            .iter()
            .map(|s| (s.clone(), MockSiteState::default()))
            .collect();
        Self {
            sites,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Canned results returned by successful searches of a site.
    pub async fn set_results(&self, site: &str, results: Vec<SearchCandidate>) {
        if let Some(s) = self.state.write().await.get_mut(site) {
            s.results = results;
        }
    }

    /// Make the next `count` searches of a site fail.
    pub async fn fail_next(&self, site: &str, count: u32, transient: bool) {
        if let Some(s) = self.state.write().await.get_mut(site) {
            s.failures_remaining = count;
            s.fail_transient = transient;
        }
    }

    /// Number of search calls a site has received.
    pub async fn search_count(&self, site: &str) -> u32 {
        self.state
            .read()
            .await
            .get(site)
            .map(|s| s.search_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SiteRegistry for MockSiteRegistry {
    fn name(&self) -> &str {
        "mock"
    }

    fn target_sites(&self) -> Vec<String> {
        self.sites.clone()
    }

    async fn search(
        &self,
        site: &str,
        _keywords: &str,
    ) -> Result<Vec<SearchCandidate>, SiteError> {
        let mut state = self.state.write().await;
        let s = state
            .get_mut(site)
            .ok_or_else(|| SiteError::Permanent(format!("Unknown site: {}", site)))?;

        s.search_count += 1;
        if s.failures_remaining > 0 {
            s.failures_remaining -= 1;
            return if s.fail_transient {
                Err(SiteError::Transient("injected failure".to_string()))
            } else {
                Err(SiteError::Permanent("injected failure".to_string()))
            };
        }
        Ok(s.results.clone())
    }
}
