//! Types for download client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during download client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl ClientError {
    /// Whether the error is transient and the operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionFailed(_) | ClientError::Timeout
        )
    }
}

/// State of a torrent as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Fetching data from peers (including stalled or queued downloads).
    Downloading,
    /// Seeding to peers.
    Seeding,
    /// Fully downloaded but not uploading.
    Complete,
    /// Checking file integrity.
    Checking,
    /// Download or upload is paused.
    Paused,
    /// Error state.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Complete => "complete",
            TorrentState::Checking => "checking",
            TorrentState::Paused => "paused",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }

    /// The stop-loss trigger: a freshly injected torrent in this state is
    /// pulling data instead of seeding the existing files.
    pub fn is_downloading(&self) -> bool {
        matches!(self, TorrentState::Downloading)
    }
}

/// A file within a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent's save path.
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Immutable snapshot of a completed torrent in the local client.
///
/// Re-fetched every reconciliation cycle; never mutated within one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTorrent {
    /// Info hash (lowercase hex). Unique identity.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Site the torrent was originally downloaded from, if known.
    pub source_site: Option<String>,
    /// Save path on disk.
    pub save_path: PathBuf,
    /// Constituent files in torrent order.
    pub files: Vec<TorrentFile>,
    /// Total size in bytes.
    pub total_size: u64,
    /// Client-side tags.
    pub tags: Vec<String>,
}

/// Request to add a torrent to the client.
#[derive(Debug, Clone)]
pub struct AddTorrentRequest {
    /// Download URL or magnet URI of the torrent to add.
    pub source_url: String,
    /// Forced save path. None uses the client's default.
    pub save_path: Option<PathBuf>,
    /// Instruct the client to neither relocate nor rename content.
    pub no_relocate: bool,
    /// Tag applied to the new torrent.
    pub tag: Option<String>,
}

impl AddTorrentRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            save_path: None,
            no_relocate: false,
            tag: None,
        }
    }

    pub fn with_save_path(mut self, path: PathBuf) -> Self {
        self.save_path = Some(path);
        self
    }

    pub fn with_no_relocate(mut self) -> Self {
        self.no_relocate = true;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone)]
pub struct AddedTorrent {
    /// Info hash of the new torrent (lowercase hex).
    pub hash: String,
}

/// Trait for download client backends.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    /// All fully-downloaded torrents currently in the client, with their
    /// file manifests.
    async fn list_completed(&self) -> Result<Vec<LocalTorrent>, ClientError>;

    /// Add a torrent and return its identity.
    async fn add_torrent(&self, request: AddTorrentRequest) -> Result<AddedTorrent, ClientError>;

    /// Current state of a torrent.
    async fn get_state(&self, hash: &str) -> Result<TorrentState, ClientError>;

    /// Remove a torrent, optionally deleting its downloaded files.
    async fn remove_torrent(&self, hash: &str, delete_files: bool) -> Result<(), ClientError>;
}
