//! qBittorrent download client implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::DownloaderConfig;

use super::{
    AddTorrentRequest, AddedTorrent, ClientError, DownloadClient, LocalTorrent, TorrentFile,
    TorrentState,
};

/// qBittorrent Web API client.
pub struct QBittorrentClient {
    client: Client,
    config: DownloaderConfig,
    /// Session marker (refreshed on auth failure; cookie lives in the jar).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: DownloaderConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::ApiError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), ClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(ClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(ClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), ClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Make an authenticated GET request, re-authenticating once on 403.
    async fn get(&self, endpoint: &str) -> Result<String, ClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            if !response.status().is_success() {
                return Err(ClientError::ApiError(format!(
                    "HTTP {}",
                    response.status()
                )));
            }

            return response
                .text()
                .await
                .map_err(|e| ClientError::ApiError(e.to_string()));
        }

        if !status.is_success() {
            return Err(ClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| ClientError::ApiError(e.to_string()))
    }

    /// Make an authenticated POST request with form data.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, ClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            if !response.status().is_success() {
                return Err(ClientError::ApiError(format!(
                    "HTTP {}",
                    response.status()
                )));
            }

            return response
                .text()
                .await
                .map_err(|e| ClientError::ApiError(e.to_string()));
        }

        if !status.is_success() {
            return Err(ClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| ClientError::ApiError(e.to_string()))
    }

    async fn fetch_info(&self, query: &str) -> Result<Vec<QBTorrentInfo>, ClientError> {
        let response = self.get(&format!("/api/v2/torrents/info{}", query)).await?;
        serde_json::from_str(&response)
            .map_err(|e| ClientError::ApiError(format!("Failed to parse response: {}", e)))
    }

    async fn fetch_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
        let response = self
            .get(&format!("/api/v2/torrents/files?hash={}", hash))
            .await?;
        let files: Vec<QBFileInfo> = serde_json::from_str(&response)
            .map_err(|e| ClientError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(files
            .into_iter()
            .map(|f| TorrentFile {
                path: f.name,
                size_bytes: f.size.max(0) as u64,
            })
            .collect())
    }

    async fn current_hashes(&self) -> Result<Vec<String>, ClientError> {
        Ok(self
            .fetch_info("")
            .await?
            .into_iter()
            .map(|t| t.hash.to_lowercase())
            .collect())
    }
}

/// qBittorrent torrent info response (fields we use).
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    size: i64,
    save_path: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    tracker: String,
}

/// qBittorrent per-file response.
#[derive(Debug, Deserialize)]
struct QBFileInfo {
    name: String,
    size: i64,
}

/// Parse qBittorrent state string to TorrentState.
///
/// Stalled and queued downloads count as downloading: a freshly injected
/// torrent in any of those states is trying to fetch data it should already
/// have on disk.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "allocating" | "stalledDL" | "queuedDL" => {
            TorrentState::Downloading
        }
        "uploading" | "forcedUP" | "stalledUP" | "queuedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Host of the torrent's announce URL, used as the originating site id.
fn tracker_host(tracker: &str) -> Option<String> {
    let rest = tracker.split("://").nth(1)?;
    let host = rest.split('/').next()?.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Extract info hash from a magnet URI.
fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let query = magnet.split('?').nth(1)?;
    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("xt=urn:btih:") {
            return Some(value.to_lowercase());
        }
    }
    None
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else if e.is_connect() {
        ClientError::ConnectionFailed(e.to_string())
    } else {
        ClientError::ApiError(e.to_string())
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn list_completed(&self) -> Result<Vec<LocalTorrent>, ClientError> {
        let infos = self.fetch_info("?filter=completed").await?;

        let mut torrents = Vec::with_capacity(infos.len());
        for info in infos {
            let hash = info.hash.to_lowercase();
            let files = self.fetch_files(&hash).await?;
            let tags = info
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();

            torrents.push(LocalTorrent {
                source_site: tracker_host(&info.tracker),
                hash,
                name: info.name,
                save_path: PathBuf::from(info.save_path),
                total_size: info.size.max(0) as u64,
                files,
                tags,
            });
        }

        Ok(torrents)
    }

    async fn add_torrent(&self, request: AddTorrentRequest) -> Result<AddedTorrent, ClientError> {
        // Snapshot existing hashes so a URL-sourced add can be identified
        // afterwards; qBittorrent's add endpoint does not return the hash.
        let known_magnet_hash = extract_hash_from_magnet(&request.source_url);
        let before = if known_magnet_hash.is_none() {
            self.current_hashes().await?
        } else {
            Vec::new()
        };

        let save_path = request
            .save_path
            .as_ref()
            .map(|p| p.display().to_string());

        let mut params: Vec<(&str, &str)> = vec![("urls", request.source_url.as_str())];
        if let Some(ref path) = save_path {
            params.push(("savepath", path.as_str()));
            // Forced save path is incompatible with automatic management.
            params.push(("autoTMM", "false"));
        }
        if request.no_relocate {
            params.push(("contentLayout", "Original"));
        }
        if let Some(ref tag) = request.tag {
            params.push(("tags", tag.as_str()));
        }

        self.post_form("/api/v2/torrents/add", &params).await?;

        if let Some(hash) = known_magnet_hash {
            return Ok(AddedTorrent { hash });
        }

        // The client registers the torrent asynchronously; give it a few
        // polls to show up.
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let after = self.current_hashes().await?;
            if let Some(hash) = after.into_iter().find(|h| !before.contains(h)) {
                return Ok(AddedTorrent { hash });
            }
        }

        Err(ClientError::ApiError(
            "Added torrent did not appear in the client".to_string(),
        ))
    }

    async fn get_state(&self, hash: &str) -> Result<TorrentState, ClientError> {
        let hash_lower = hash.to_lowercase();
        let infos = self
            .fetch_info(&format!("?hashes={}", hash_lower))
            .await?;

        infos
            .into_iter()
            .next()
            .map(|t| parse_qb_state(&t.state))
            .ok_or_else(|| ClientError::TorrentNotFound(hash.to_string()))
    }

    async fn remove_torrent(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };

        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", &hash_lower), ("deleteFiles", delete_str)],
        )
        .await?;

        Ok(())
    }
}
