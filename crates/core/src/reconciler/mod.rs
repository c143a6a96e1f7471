//! Reconciliation loop: periodic matching of local torrents to remote sites.

mod runner;
mod scanner;
mod types;

pub use runner::Reconciler;
pub use scanner::Scanner;
pub use types::{CrossSeedEvent, CycleSummary, EventOutcome, ReconcileError};
