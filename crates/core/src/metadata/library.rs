//! Sidecar-file metadata library.
//!
//! Media managers leave Kodi-style `.nfo` files next to the content they
//! organize. When one exists under the torrent's save path it carries a
//! cleaner title/year than the release name does.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::Path;
use tracing::debug;

use super::{LibraryHit, MetadataLibrary};

/// Reads `<title>` and `<year>` from an `.nfo` sidecar under the given path.
pub struct NfoMetadataLibrary {
    title: Regex,
    year: Regex,
}

impl NfoMetadataLibrary {
    pub fn new() -> Self {
        Self {
            title: Regex::new(r"<title>([^<]+)</title>").expect("static regex"),
            year: Regex::new(r"<year>(\d{4})</year>").expect("static regex"),
        }
    }

    async fn find_nfo(&self, path: &Path) -> Option<std::path::PathBuf> {
        let mut entries = tokio::fs::read_dir(path).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let candidate = entry.path();
            if candidate.extension().is_some_and(|ext| ext == "nfo") {
                return Some(candidate);
            }
        }
        None
    }
}

impl Default for NfoMetadataLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataLibrary for NfoMetadataLibrary {
    async fn lookup(&self, path: &Path) -> Option<LibraryHit> {
        let nfo = self.find_nfo(path).await?;
        let content = tokio::fs::read_to_string(&nfo).await.ok()?;

        let title = self
            .title
            .captures(&content)
            .map(|caps| caps[1].trim().to_string())
            .filter(|t| !t.is_empty())?;

        let year = self
            .year
            .captures(&content)
            .and_then(|caps| caps[1].parse::<u16>().ok());

        debug!(nfo = %nfo.display(), title, "metadata sidecar hit");
        Some(LibraryHit { title, year })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_reads_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("movie.nfo"),
            "<movie><title>Show Name</title><year>2024</year></movie>",
        )
        .await
        .unwrap();

        let library = NfoMetadataLibrary::new();
        let hit = library.lookup(dir.path()).await.unwrap();
        assert_eq!(hit.title, "Show Name");
        assert_eq!(hit.year, Some(2024));
    }

    #[tokio::test]
    async fn test_lookup_without_sidecar_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let library = NfoMetadataLibrary::new();
        assert!(library.lookup(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_missing_title_is_none() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("movie.nfo"), "<movie><year>2024</year></movie>")
            .await
            .unwrap();

        let library = NfoMetadataLibrary::new();
        assert!(library.lookup(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_nonexistent_path_is_none() {
        let library = NfoMetadataLibrary::new();
        assert!(library
            .lookup(Path::new("/nonexistent/path"))
            .await
            .is_none());
    }
}
