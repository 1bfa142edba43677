//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::model::PersistedRecord;
use crate::output::RunSummary;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, root_url, config_hash, status, pages,
     detail_links, persisted, skipped, failed, listing_failures, assets_stored, assets_cached,
     assets_failed, cancelled";

const RECORD_COLUMNS: &str = "id, rank, name, directors, writers, actors, genre, country,
     release_date, rating, asset_url, update_time";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        root_url: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        summary: RunSummary {
            pages: row.get(6)?,
            detail_links: row.get(7)?,
            persisted: row.get(8)?,
            skipped: row.get(9)?,
            failed: row.get(10)?,
            listing_failures: row.get(11)?,
            assets_stored: row.get(12)?,
            assets_cached: row.get(13)?,
            assets_failed: row.get(14)?,
            cancelled: row.get(15)?,
        },
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PersistedRecord> {
    let update_time: String = row.get(11)?;
    let update_time = DateTime::parse_from_rfc3339(&update_time)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(PersistedRecord {
        id: row.get(0)?,
        rank: row.get(1)?,
        name: row.get(2)?,
        directors: row.get(3)?,
        writers: row.get(4)?,
        actors: row.get(5)?,
        genre: row.get(6)?,
        country: row.get(7)?,
        release_date: row.get(8)?,
        rating: row.get(9)?,
        asset_url: row.get(10)?,
        update_time,
    })
}

impl RecordStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, root_url: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, root_url, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, root_url, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages = ?3, detail_links = ?4,
             persisted = ?5, skipped = ?6, failed = ?7, listing_failures = ?8,
             assets_stored = ?9, assets_cached = ?10, assets_failed = ?11, cancelled = ?12
             WHERE id = ?13",
            params![
                status.to_db_string(),
                now,
                summary.pages,
                summary.detail_links,
                summary.persisted,
                summary.skipped,
                summary.failed,
                summary.listing_failures,
                summary.assets_stored,
                summary.assets_cached,
                summary.assets_failed,
                summary.cancelled,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    // ===== Records =====

    fn upsert_record(&mut self, record: &PersistedRecord) -> StorageResult<()> {
        // One statement: the conflict target makes insert-or-overwrite atomic.
        self.conn.execute(
            "INSERT INTO records (id, rank, name, directors, writers, actors, genre, country,
                                  release_date, rating, asset_url, update_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                rank = excluded.rank,
                name = excluded.name,
                directors = excluded.directors,
                writers = excluded.writers,
                actors = excluded.actors,
                genre = excluded.genre,
                country = excluded.country,
                release_date = excluded.release_date,
                rating = excluded.rating,
                asset_url = excluded.asset_url,
                update_time = excluded.update_time",
            params![
                record.id,
                record.rank,
                record.name,
                record.directors,
                record.writers,
                record.actors,
                record.genre,
                record.country,
                record.release_date,
                record.rating,
                record.asset_url,
                record.update_time.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_record(&self, id: &str) -> StorageResult<Option<PersistedRecord>> {
        let sql = format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![id], record_from_row)
            .optional()?;
        Ok(record)
    }

    fn list_records(&self) -> StorageResult<Vec<PersistedRecord>> {
        let sql = format!("SELECT {} FROM records ORDER BY rank, name", RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn latest_update_time(&self) -> StorageResult<Option<DateTime<Utc>>> {
        // Every stored timestamp is UTC RFC 3339, so text order is time order
        let latest: Option<String> = self.conn.query_row(
            "SELECT MAX(update_time) FROM records",
            [],
            |row| row.get(0),
        )?;

        latest
            .map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|time| time.with_timezone(&Utc))
                    .map_err(|e| {
                        StorageError::from(rusqlite::Error::FromSqlConversionFailure(
                            0,
                            Type::Text,
                            Box::new(e),
                        ))
                    })
            })
            .transpose()
    }
}
