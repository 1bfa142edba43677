//! Idempotent record sink
//!
//! Records are written with a single atomic upsert keyed by the name digest.
//! Re-harvesting a title overwrites its previous row and refreshes its
//! timestamp; it never adds a second row.

use crate::crawler::fetcher::backoff_delay;
use crate::model::{PersistedRecord, Record};
use crate::storage::{SharedStore, StorageError};
use chrono::Utc;
use std::time::Duration;

const PERSIST_BACKOFF_BASE: Duration = Duration::from_millis(50);
const PERSIST_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Writes records to the shared store under their stable identity
#[derive(Clone)]
pub struct IdempotentSink {
    store: SharedStore,
    attempts: u32,
}

impl IdempotentSink {
    /// Creates a sink that tries each upsert up to `attempts` times
    pub fn new(store: SharedStore, attempts: u32) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
        }
    }

    /// Inserts or replaces the row for this record's identity
    ///
    /// The stored `update_time` is the moment of this call. Transient store
    /// errors are retried with a short backoff; the last error is returned
    /// once attempts run out.
    pub async fn upsert(&self, record: &Record) -> Result<PersistedRecord, StorageError> {
        let mut attempt = 1;
        loop {
            match self.upsert_once(record) {
                Ok(persisted) => return Ok(persisted),
                Err(StorageError::LockPoisoned) => return Err(StorageError::LockPoisoned),
                Err(e) if attempt < self.attempts => {
                    let delay = backoff_delay(attempt, PERSIST_BACKOFF_BASE, PERSIST_BACKOFF_MAX);
                    tracing::warn!(
                        "Upsert of '{}' failed (attempt {}/{}): {}, retrying in {:?}",
                        record.name,
                        attempt,
                        self.attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn upsert_once(&self, record: &Record) -> Result<PersistedRecord, StorageError> {
        let persisted = PersistedRecord::from_record(record, Utc::now());
        let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        store.upsert_record(&persisted)?;
        tracing::debug!("Upserted #{} '{}' as {}", persisted.rank, persisted.name, persisted.id);
        Ok(persisted)
    }
}
