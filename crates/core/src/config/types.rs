use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub sites: SitesConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Download client (qBittorrent) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    /// qBittorrent WebUI URL (e.g. "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Ledger storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("crossseed.db")
}

/// Site registry configuration: the Torznab endpoint and the sites to cross-seed to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SitesConfig {
    /// Torznab aggregator URL (e.g. "http://localhost:9117")
    pub url: String,
    /// Torznab API key
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Site identifiers to search when cross-seeding.
    pub target_sites: Vec<String>,
}

fn default_timeout() -> u32 {
    30
}

/// Tunables for the reconciliation engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Torrents carrying any of these tags are never cross-seeded.
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    /// Accepted size delta between local and remote release, in megabytes.
    #[serde(default = "default_size_tolerance_mb")]
    pub size_tolerance_mb: f64,
    /// Point the injected torrent at the existing on-disk data instead of the
    /// client's default save path.
    #[serde(default)]
    pub split_mode: bool,
    /// Lower bound of the randomized per-site search cooldown, in seconds.
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min_secs: u64,
    /// Upper bound of the randomized per-site search cooldown, in seconds.
    #[serde(default = "default_cooldown_max")]
    pub cooldown_max_secs: u64,
    /// Attempts per torrent (ledger retry ceiling) and per-site query retries.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// Torrent pipelines processed concurrently per cycle.
    #[serde(default = "default_worker_pool")]
    pub worker_pool: usize,
    /// Site queries in flight at once, across all torrent pipelines.
    #[serde(default = "default_search_workers")]
    pub search_workers: usize,
    /// Minutes between scheduled cycles (daemon only).
    #[serde(default = "default_run_interval_mins")]
    pub run_interval_mins: u64,
    /// If set, failed ledger entries past the retry ceiling are dropped after
    /// this many days, making the torrent eligible again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_entry_ttl_days: Option<u32>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            exclude_tags: Vec::new(),
            size_tolerance_mb: default_size_tolerance_mb(),
            split_mode: false,
            cooldown_min_secs: default_cooldown_min(),
            cooldown_max_secs: default_cooldown_max(),
            max_retry: default_max_retry(),
            worker_pool: default_worker_pool(),
            search_workers: default_search_workers(),
            run_interval_mins: default_run_interval_mins(),
            failed_entry_ttl_days: None,
        }
    }
}

fn default_size_tolerance_mb() -> f64 {
    0.01
}

fn default_cooldown_min() -> u64 {
    5
}

fn default_cooldown_max() -> u64 {
    10
}

fn default_max_retry() -> u32 {
    3
}

fn default_worker_pool() -> usize {
    4
}

fn default_search_workers() -> usize {
    2
}

fn default_run_interval_mins() -> u64 {
    120
}

impl ReconcileConfig {
    /// Size tolerance in whole bytes, as used by the matcher.
    pub fn size_tolerance_bytes(&self) -> u64 {
        (self.size_tolerance_mb * 1024.0 * 1024.0) as u64
    }
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub downloader: SanitizedDownloaderConfig,
    pub ledger: LedgerConfig,
    pub sites: SanitizedSitesConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloaderConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSitesConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub target_sites: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            downloader: SanitizedDownloaderConfig {
                url: config.downloader.url.clone(),
                username: config.downloader.username.clone(),
                password_configured: !config.downloader.password.is_empty(),
                timeout_secs: config.downloader.timeout_secs,
            },
            ledger: config.ledger.clone(),
            sites: SanitizedSitesConfig {
                url: config.sites.url.clone(),
                api_key_configured: !config.sites.api_key.is_empty(),
                timeout_secs: config.sites.timeout_secs,
                target_sites: config.sites.target_sites.clone(),
            },
            reconcile: config.reconcile.clone(),
        }
    }
}
