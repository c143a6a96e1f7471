//! Remote site search: keyword fan-out against the configured target sites.

mod orchestrator;
mod torznab;
mod types;

pub use orchestrator::SearchOrchestrator;
pub use torznab::TorznabRegistry;
pub use types::{build_query, SearchCandidate, SiteError, SiteRegistry};
