//! Durable per-torrent outcome ledger.
//!
//! The ledger is the only persisted state of the engine: a key-value store
//! of cross-seed attempt outcomes keyed by local torrent hash. It decides
//! which torrents are still worth attempting.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteLedger;
pub use store::LedgerStore;
pub use types::{LedgerEntry, LedgerError};
