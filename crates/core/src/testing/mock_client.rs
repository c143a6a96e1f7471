//! Mock download client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::client::{
    AddTorrentRequest, AddedTorrent, ClientError, DownloadClient, LocalTorrent, TorrentState,
};

/// Mock implementation of the DownloadClient trait.
///
/// Provides controllable behavior for testing:
/// - Track added and removed torrents for assertions
/// - Control the state reported for injected torrents
/// - Simulate failures
pub struct MockDownloadClient {
    /// Torrents returned by list_completed.
    completed: Arc<RwLock<Vec<LocalTorrent>>>,
    /// Recorded add_torrent requests.
    added: Arc<RwLock<Vec<AddTorrentRequest>>>,
    /// Recorded remove_torrent calls as (hash, delete_files).
    removed: Arc<RwLock<Vec<(String, bool)>>>,
    /// Per-hash state overrides.
    states: Arc<RwLock<HashMap<String, TorrentState>>>,
    /// State reported for torrents added through the mock.
    added_state: Arc<RwLock<TorrentState>>,
    /// If set, the next add_torrent fails with this error.
    next_add_error: Arc<RwLock<Option<ClientError>>>,
    /// If set, the next remove_torrent fails with this error.
    next_remove_error: Arc<RwLock<Option<ClientError>>>,
    /// If set, the next list_completed fails with this error.
    next_list_error: Arc<RwLock<Option<ClientError>>>,
    /// Counter for generating unique hashes.
    hash_counter: Arc<RwLock<u32>>,
}

impl Default for MockDownloadClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDownloadClient {
    pub fn new() -> Self {
        Self {
            completed: Arc::new(RwLock::new(Vec::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            removed: Arc::new(RwLock::new(Vec::new())),
            states: Arc::new(RwLock::new(HashMap::new())),
            added_state: Arc::new(RwLock::new(TorrentState::Seeding)),
            next_add_error: Arc::new(RwLock::new(None)),
            next_remove_error: Arc::new(RwLock::new(None)),
            next_list_error: Arc::new(RwLock::new(None)),
            hash_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Seed the completed-torrent listing.
    pub async fn set_completed(&self, torrents: Vec<LocalTorrent>) {
        *self.completed.write().await = torrents;
    }

    /// State reported for every torrent added after this call.
    pub async fn set_added_state(&self, state: TorrentState) {
        *self.added_state.write().await = state;
    }

    /// Override the state of a specific torrent.
    pub async fn set_state(&self, hash: &str, state: TorrentState) {
        self.states.write().await.insert(hash.to_string(), state);
    }

    pub async fn fail_next_add(&self, error: ClientError) {
        *self.next_add_error.write().await = Some(error);
    }

    pub async fn fail_next_remove(&self, error: ClientError) {
        *self.next_remove_error.write().await = Some(error);
    }

    pub async fn fail_next_list(&self, error: ClientError) {
        *self.next_list_error.write().await = Some(error);
    }

    /// All recorded add_torrent requests.
    pub async fn add_requests(&self) -> Vec<AddTorrentRequest> {
        self.added.read().await.clone()
    }

    /// All recorded remove_torrent calls as (hash, delete_files).
    pub async fn removals(&self) -> Vec<(String, bool)> {
        self.removed.read().await.clone()
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_completed(&self) -> Result<Vec<LocalTorrent>, ClientError> {
        if let Some(error) = self.next_list_error.write().await.take() {
            return Err(error);
        }
        Ok(self.completed.read().await.clone())
    }

    async fn add_torrent(&self, request: AddTorrentRequest) -> Result<AddedTorrent, ClientError> {
        if let Some(error) = self.next_add_error.write().await.take() {
            return Err(error);
        }

        self.added.write().await.push(request);

        let hash = {
            let mut counter = self.hash_counter.write().await;
            *counter += 1;
            format!("{:040x}", *counter)
        };
        let state = *self.added_state.read().await;
        self.states.write().await.insert(hash.clone(), state);

        Ok(AddedTorrent { hash })
    }

    async fn get_state(&self, hash: &str) -> Result<TorrentState, ClientError> {
        self.states
            .read()
            .await
            .get(hash)
            .copied()
            .ok_or_else(|| ClientError::TorrentNotFound(hash.to_string()))
    }

    async fn remove_torrent(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
        if let Some(error) = self.next_remove_error.write().await.take() {
            return Err(error);
        }
        self.removed
            .write()
            .await
            .push((hash.to_string(), delete_files));
        self.states.write().await.remove(hash);
        Ok(())
    }
}
