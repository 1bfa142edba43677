//! Output module for run summaries, statistics and exports
//!
//! This module handles:
//! - Counting per-record outcomes into a run summary
//! - Reading statistics back from the database
//! - Exporting persisted records as JSON

mod export;
pub mod stats;
mod summary;

pub use export::export_json;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use summary::{AssetOutcome, RecordOutcome, RunSummary};
