//! Types for metadata normalization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Video resolution tag parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    R720p,
    R1080p,
    /// 2160p and 4K releases collapse to this tag.
    R2160p,
    Unknown,
}

impl Resolution {
    /// Query-string form; `Unknown` contributes nothing to the query.
    pub fn as_query_term(&self) -> Option<&'static str> {
        match self {
            Resolution::R720p => Some("720p"),
            Resolution::R1080p => Some("1080p"),
            Resolution::R2160p => Some("2160p"),
            Resolution::Unknown => None,
        }
    }
}

/// Video codec tag parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    H264,
    H265,
    Unknown,
}

/// Canonical metadata derived from a local torrent.
///
/// Produced once per torrent per cycle and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetadata {
    /// Canonical title: lowercased, bracket noise stripped, separators
    /// collapsed to single spaces.
    pub title: String,
    /// Same transform retaining the original casing, for display.
    pub display_title: String,
    /// Four-digit release year, when one could be found.
    pub year: Option<u16>,
    pub resolution: Resolution,
    pub codec: Codec,
}

/// A title/year hit from the external media library.
#[derive(Debug, Clone)]
pub struct LibraryHit {
    pub title: String,
    pub year: Option<u16>,
}

/// Best-effort external metadata lookup by on-disk path.
///
/// Implementations must degrade to `None` rather than fail; the normalizer
/// always has the regex fallback.
#[async_trait]
pub trait MetadataLibrary: Send + Sync {
    async fn lookup(&self, path: &Path) -> Option<LibraryHit>;
}
