//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::PersistedRecord;
use crate::output::RunSummary;
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Store lock poisoned by a panicked worker")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The pipeline shares one handle across workers behind a mutex, so
/// implementations only need to be `Send`.
pub trait RecordStore: Send {
    // ===== Run Management =====

    /// Creates a new run in the `running` state and returns its ID
    fn create_run(&mut self, root_url: &str, config_hash: &str) -> StorageResult<i64>;

    /// Stamps the finish time, final status and counts of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Records =====

    /// Inserts the record or overwrites the row with the same `id`
    ///
    /// Must be a single atomic write: two concurrent upserts of one `id`
    /// leave exactly one row.
    fn upsert_record(&mut self, record: &PersistedRecord) -> StorageResult<()>;

    /// Gets a record by ID
    fn get_record(&self, id: &str) -> StorageResult<Option<PersistedRecord>>;

    /// Lists every record ordered by rank
    fn list_records(&self) -> StorageResult<Vec<PersistedRecord>>;

    /// Counts stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Most recent `update_time` across all records, if any are stored
    fn latest_update_time(&self) -> StorageResult<Option<DateTime<Utc>>>;
}
