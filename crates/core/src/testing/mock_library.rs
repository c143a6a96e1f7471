//! Mock metadata library for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::metadata::{LibraryHit, MetadataLibrary};

/// Mock implementation of the MetadataLibrary trait with canned per-path hits.
#[derive(Default)]
pub struct MockMetadataLibrary {
    hits: Arc<RwLock<HashMap<PathBuf, LibraryHit>>>,
}

impl MockMetadataLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library hit for a save path.
    pub async fn set_hit(&self, path: impl Into<PathBuf>, hit: LibraryHit) {
        self.hits.write().await.insert(path.into(), hit);
    }
}

#[async_trait]
impl MetadataLibrary for MockMetadataLibrary {
    async fn lookup(&self, path: &Path) -> Option<LibraryHit> {
        self.hits.read().await.get(path).cloned()
    }
}
