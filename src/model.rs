//! Record types flowing through the pipeline
//!
//! A [`Record`] is what the extractor reads off one detail page. The sink turns
//! it into a [`PersistedRecord`] by attaching the identity digest and the
//! upsert timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

/// Separator used when a multi-valued field is stored as one string
pub const TAG_SEPARATOR: &str = " / ";

/// One title as extracted from its detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Source-assigned ordinal, always >= 1
    pub rank: u32,

    /// Display name; the natural key
    pub name: String,

    pub directors: Vec<String>,
    pub writers: Vec<String>,
    pub actors: Vec<String>,
    pub genre: Vec<String>,
    pub country: String,

    /// Release dates as printed by the source, " / "-joined
    pub release_date: String,

    /// Average rating as printed by the source (e.g. "9.7")
    pub rating: String,

    /// Absolute URL of the cover image, if the page had one
    pub asset_url: Option<String>,
}

impl Record {
    /// The stable identity this record will be stored under
    pub fn id(&self) -> String {
        record_id(&self.name)
    }
}

/// The stored form of a [`Record`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRecord {
    /// Hex SHA-256 of the name
    pub id: String,
    pub rank: u32,
    pub name: String,
    pub directors: String,
    pub writers: String,
    pub actors: String,
    pub genre: String,
    pub country: String,
    pub release_date: String,
    pub rating: String,
    pub asset_url: Option<String>,

    /// Time of the most recent successful upsert
    pub update_time: DateTime<Utc>,
}

impl PersistedRecord {
    /// Attaches identity and timestamp to an extracted record
    pub fn from_record(record: &Record, update_time: DateTime<Utc>) -> Self {
        Self {
            id: record.id(),
            rank: record.rank,
            name: record.name.clone(),
            directors: join_tags(&record.directors),
            writers: join_tags(&record.writers),
            actors: join_tags(&record.actors),
            genre: join_tags(&record.genre),
            country: record.country.clone(),
            release_date: record.release_date.clone(),
            rating: record.rating.clone(),
            asset_url: record.asset_url.clone(),
            update_time,
        }
    }
}

/// Computes the persisted identity for a record name
///
/// The digest depends only on the UTF-8 bytes of `name`, so it is identical
/// across runs, processes and platforms.
pub fn record_id(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Joins a multi-valued field for storage, preserving source order
pub fn join_tags(tags: &[String]) -> String {
    tags.join(TAG_SEPARATOR)
}

/// Ordered, duplicate-free list of listing pages; the root is always first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    pages: Vec<Url>,
}

impl PageSet {
    /// Creates a set holding only the root page
    pub fn new(root: Url) -> Self {
        Self { pages: vec![root] }
    }

    /// Appends a page unless it is already present
    ///
    /// Returns true if the page was added.
    pub fn push(&mut self, page: Url) -> bool {
        if self.pages.contains(&page) {
            return false;
        }
        self.pages.push(page);
        true
    }

    pub fn root(&self) -> &Url {
        &self.pages[0]
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always false; a page set contains at least the root
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.pages.iter()
    }

    /// Keeps at most `limit` pages (the root is never dropped)
    pub fn truncate(&mut self, limit: usize) {
        self.pages.truncate(limit.max(1));
    }
}
