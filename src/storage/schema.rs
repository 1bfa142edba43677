//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Reel-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    root_url TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages INTEGER NOT NULL DEFAULT 0,
    detail_links INTEGER NOT NULL DEFAULT 0,
    persisted INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    listing_failures INTEGER NOT NULL DEFAULT 0,
    assets_stored INTEGER NOT NULL DEFAULT 0,
    assets_cached INTEGER NOT NULL DEFAULT 0,
    assets_failed INTEGER NOT NULL DEFAULT 0,
    cancelled INTEGER NOT NULL DEFAULT 0
);

-- One row per title, keyed by the digest of its name
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    rank INTEGER NOT NULL,
    name TEXT NOT NULL,
    directors TEXT NOT NULL DEFAULT '',
    writers TEXT NOT NULL DEFAULT '',
    actors TEXT NOT NULL DEFAULT '',
    genre TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    release_date TEXT NOT NULL DEFAULT '',
    rating TEXT NOT NULL DEFAULT '',
    asset_url TEXT,
    update_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_rank ON records(rank);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
