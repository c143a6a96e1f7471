//! Types for the remote site search system.

use async_trait::async_trait;
use thiserror::Error;

use crate::client::TorrentFile;
use crate::metadata::NormalizedMetadata;

/// A remote hit returned by a site search.
///
/// Ephemeral: exists only during one reconciliation pass.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    /// Site that returned this hit.
    pub site: String,
    /// Download URL or magnet URI used to add the torrent.
    pub source_url: String,
    /// Release name as declared by the site.
    pub title: String,
    /// Declared total size in bytes.
    pub size_bytes: u64,
    /// Per-file manifest, when the site exposes it pre-download.
    pub files: Option<Vec<TorrentFile>>,
}

/// Errors raised by site search backends.
#[derive(Debug, Error)]
pub enum SiteError {
    /// Network/timeout/rate-limit conditions; worth retrying.
    #[error("Transient site error: {0}")]
    Transient(String),

    /// Malformed responses, bad credentials, unknown sites; retrying is
    /// pointless within a cycle.
    #[error("Permanent site error: {0}")]
    Permanent(String),
}

impl SiteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SiteError::Transient(_))
    }
}

/// Trait for site registry backends providing per-site search.
#[async_trait]
pub trait SiteRegistry: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Sites configured as cross-seed targets.
    fn target_sites(&self) -> Vec<String>;

    /// Search a single site with a keyword query.
    async fn search(
        &self,
        site: &str,
        keywords: &str,
    ) -> Result<Vec<SearchCandidate>, SiteError>;
}

/// Keyword query for a torrent: title + year + resolution.
///
/// The codec is withheld from the query (sites tag encodes inconsistently)
/// but kept in the metadata for scoring.
pub fn build_query(metadata: &NormalizedMetadata) -> String {
    let mut query = metadata.title.clone();
    if let Some(year) = metadata.year {
        query.push(' ');
        query.push_str(&year.to_string());
    }
    if let Some(term) = metadata.resolution.as_query_term() {
        query.push(' ');
        query.push_str(term);
    }
    query
}
