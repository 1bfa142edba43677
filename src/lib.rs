//! Reel-Harvest: a polite listing harvester
//!
//! This crate walks a paginated listing, extracts one structured record per
//! detail page, upserts each record into SQLite under a stable identity and
//! downloads the record's cover image. Re-running against the same source
//! never duplicates records.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Reel-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunPhase,
        to: state::RunPhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Network-level failures, raised by the fetcher
#[derive(Debug, Error)]
pub enum TransportError {
    /// Non-retryable HTTP status (4xx other than 429)
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Retries ran out; `cause` is the last failure observed
    #[error("Gave up on {url} after {attempts} attempts: {cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        cause: String,
    },

    /// The request could not be constructed (e.g. malformed URL)
    #[error("Invalid request for {url}: {cause}")]
    Request { url: String, cause: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// An expected structural element was missing or unreadable
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No {element} element found on {url}")]
    MissingElement { element: &'static str, url: String },

    #[error("Required field '{field}' missing on {url}")]
    MissingField { field: &'static str, url: String },

    #[error("Field '{field}' has unusable value '{value}' on {url}")]
    InvalidField {
        field: &'static str,
        value: String,
        url: String,
    },

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Cover image download or write failures. Never fatal for a record.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Download failed: {0}")]
    Download(#[from] TransportError),

    #[error("Invalid asset URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for Reel-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{record_id, PageSet, PersistedRecord, Record};
pub use state::RunPhase;
