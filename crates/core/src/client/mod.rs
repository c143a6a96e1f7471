//! Download client abstraction.
//!
//! This module provides a `DownloadClient` trait for the local torrent
//! client the engine scans and injects into, with a qBittorrent Web API
//! implementation.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
