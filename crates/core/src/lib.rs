pub mod client;
pub mod config;
pub mod injector;
pub mod ledger;
pub mod matcher;
pub mod metadata;
pub mod reconciler;
pub mod search;
pub mod testing;

pub use client::{DownloadClient, LocalTorrent, QBittorrentClient, TorrentState};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use injector::{InjectionOutcome, Injector};
pub use ledger::{LedgerEntry, LedgerError, LedgerStore, SqliteLedger};
pub use matcher::{MatchResult, Matcher, NoMatchReason};
pub use metadata::{NfoMetadataLibrary, NormalizedMetadata, Normalizer};
pub use reconciler::{CrossSeedEvent, CycleSummary, Reconciler};
pub use search::{SearchOrchestrator, SiteRegistry, TorznabRegistry};
