//! Per-run outcome accounting
//!
//! Every detail URL ends in exactly one [`RecordOutcome`]; the summary folds
//! them into counts so no failure is dropped silently.

use std::path::PathBuf;

/// What happened to a record's cover image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    /// The record has no image URL
    NoAsset,

    /// Downloaded and written to this path
    Stored(PathBuf),

    /// A file for this record already existed
    AlreadyPresent(PathBuf),

    /// Download or write failed; the record was still persisted
    Failed(String),
}

/// Final state of one detail URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Record upserted under `id`
    Persisted { id: String, asset: AssetOutcome },

    /// Page fetched but a required field was missing
    Skipped { reason: String },

    /// Page could not be fetched, or every upsert attempt failed
    Failed { reason: String },
}

/// Counts for one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Listing pages in the discovered page set (after page-limit)
    pub pages: u64,

    /// Unique detail links collected from listing pages
    pub detail_links: u64,

    pub persisted: u64,
    pub skipped: u64,
    pub failed: u64,

    /// Listing pages that could not be fetched
    pub listing_failures: u64,

    pub assets_stored: u64,
    pub assets_cached: u64,
    pub assets_failed: u64,

    /// The run stopped handing out work because of a cancellation signal
    pub cancelled: bool,
}

impl RunSummary {
    /// Folds one record outcome into the counts, logging anything that went wrong
    pub fn record(&mut self, url: &str, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Persisted { id, asset } => {
                self.persisted += 1;
                match asset {
                    AssetOutcome::NoAsset => {
                        tracing::debug!("Record {} from {} has no image", id, url);
                    }
                    AssetOutcome::Stored(_) => self.assets_stored += 1,
                    AssetOutcome::AlreadyPresent(_) => self.assets_cached += 1,
                    AssetOutcome::Failed(reason) => {
                        self.assets_failed += 1;
                        tracing::warn!("Image for {} not saved: {}", url, reason);
                    }
                }
            }
            RecordOutcome::Skipped { reason } => {
                self.skipped += 1;
                tracing::warn!("Skipped {}: {}", url, reason);
            }
            RecordOutcome::Failed { reason } => {
                self.failed += 1;
                tracing::warn!("Failed {}: {}", url, reason);
            }
        }
    }

    /// Detail URLs that ended in any outcome
    pub fn processed(&self) -> u64 {
        self.persisted + self.skipped + self.failed
    }

    /// Writes the summary to the log at info level
    pub fn log(&self) {
        tracing::info!(
            "Run summary: {} pages, {} detail links, {} persisted, {} skipped, {} failed",
            self.pages,
            self.detail_links,
            self.persisted,
            self.skipped,
            self.failed
        );
        tracing::info!(
            "Images: {} stored, {} already present, {} failed",
            self.assets_stored,
            self.assets_cached,
            self.assets_failed
        );
        if self.listing_failures > 0 {
            tracing::warn!("{} listing pages could not be fetched", self.listing_failures);
        }
        if self.cancelled {
            tracing::warn!(
                "Run was cancelled after {} of {} detail links",
                self.processed(),
                self.detail_links
            );
        }
    }
}
