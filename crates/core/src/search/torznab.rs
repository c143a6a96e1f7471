//! Torznab-aggregator search backend (Jackett/Prowlarr style API).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::SitesConfig;

use super::{SearchCandidate, SiteError, SiteRegistry};

/// Site registry backed by a Torznab aggregator's per-indexer JSON API.
pub struct TorznabRegistry {
    client: Client,
    config: SitesConfig,
}

impl TorznabRegistry {
    /// Create a new registry with the given configuration.
    pub fn new(config: SitesConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Build the aggregator API URL for a single-site search.
    fn build_search_url(&self, site: &str, keywords: &str) -> String {
        format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(site),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(keywords)
        )
    }
}

#[async_trait]
impl SiteRegistry for TorznabRegistry {
    fn name(&self) -> &str {
        "torznab"
    }

    fn target_sites(&self) -> Vec<String> {
        self.config.target_sites.clone()
    }

    async fn search(
        &self,
        site: &str,
        keywords: &str,
    ) -> Result<Vec<SearchCandidate>, SiteError> {
        let url = self.build_search_url(site, keywords);
        debug!(site = site, query = keywords, "Searching site");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                SiteError::Transient(e.to_string())
            } else {
                SiteError::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            );
            // Server-side conditions and rate limits pass, bad requests
            // and bad credentials do not improve with retries.
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(SiteError::Transient(detail))
            } else {
                Err(SiteError::Permanent(detail))
            };
        }

        let torznab_response: TorznabResponse = response
            .json()
            .await
            .map_err(|e| SiteError::Permanent(format!("Failed to parse response: {}", e)))?;

        debug!(
            site = site,
            results = torznab_response.Results.len(),
            "Site search complete"
        );

        Ok(torznab_response
            .Results
            .into_iter()
            .filter_map(|r| {
                // A hit without any fetchable URL is unusable.
                let source_url = r.MagnetUri.or(r.Link)?;
                Some(SearchCandidate {
                    site: site.to_string(),
                    source_url,
                    title: r.Title,
                    size_bytes: r.Size.unwrap_or(0).max(0) as u64,
                    files: None, // the aggregator does not expose file manifests
                })
            })
            .collect())
    }
}

// Aggregator API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct TorznabResponse {
    Results: Vec<TorznabResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct TorznabResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
}
