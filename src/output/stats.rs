//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RecordStore, RunRecord};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Number of distinct records stored
    pub total_records: u64,

    /// Most recent update time across all records (RFC 3339)
    pub last_update: Option<String>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn RecordStore) -> Result<HarvestStatistics, HarvestError> {
    let total_records = storage.count_records()?;

    let last_update = storage.latest_update_time()?.map(|time| time.to_rfc3339());

    let latest_run = storage.get_latest_run()?;

    Ok(HarvestStatistics {
        total_records,
        last_update,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records stored: {}", stats.total_records);
    if let Some(last_update) = &stats.last_update {
        println!("Last update: {}", last_update);
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            let summary = &run.summary;
            println!("Latest run (#{}):", run.id);
            println!("  Source: {}", run.root_url);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Listing pages: {}", summary.pages);
            println!("  Detail links: {}", summary.detail_links);
            println!("  Persisted: {}", summary.persisted);
            println!("  Skipped: {}", summary.skipped);
            println!("  Failed: {}", summary.failed);
            println!(
                "  Images: {} stored, {} already present, {} failed",
                summary.assets_stored, summary.assets_cached, summary.assets_failed
            );
            if summary.cancelled {
                println!("  (cancelled before completion)");
            }
        }
        None => println!("No runs recorded yet"),
    }
}
