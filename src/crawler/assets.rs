//! Cover image store
//!
//! Images are written to `<image-dir>/<record id>.jpg`. A file is written to a
//! temporary sibling first and renamed into place, so an interrupted download
//! never leaves a truncated image under the final name.

use crate::crawler::Fetcher;
use crate::model::PersistedRecord;
use crate::output::AssetOutcome;
use crate::AssetError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

/// Directory of downloaded cover images, keyed by record identity
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    /// Opens the image directory, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| AssetError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of a record's image
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", id))
    }

    /// Downloads the record's cover image unless it is already on disk
    ///
    /// # Returns
    ///
    /// * `Ok(AssetOutcome::NoAsset)` - The record has no image URL
    /// * `Ok(AssetOutcome::AlreadyPresent)` - An image for this identity exists
    /// * `Ok(AssetOutcome::Stored)` - Downloaded and written
    /// * `Err(AssetError)` - Download or write failed
    pub async fn fetch_asset(
        &self,
        fetcher: &Fetcher,
        record: &PersistedRecord,
    ) -> Result<AssetOutcome, AssetError> {
        let Some(asset_url) = record.asset_url.as_deref() else {
            return Ok(AssetOutcome::NoAsset);
        };

        let target = self.path_for(&record.id);
        if target.exists() {
            tracing::debug!("Image for '{}' already at {}", record.name, target.display());
            return Ok(AssetOutcome::AlreadyPresent(target));
        }

        let url = Url::parse(asset_url).map_err(|source| AssetError::InvalidUrl {
            url: asset_url.to_string(),
            source,
        })?;

        let bytes = fetcher.fetch_bytes(url.as_str()).await?;
        self.write_atomic(&target, &bytes)?;

        tracing::debug!(
            "Stored {} bytes for '{}' at {}",
            bytes.len(),
            record.name,
            target.display()
        );
        Ok(AssetOutcome::Stored(target))
    }

    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), AssetError> {
        let write_err = |source: std::io::Error| AssetError::Write {
            path: target.to_path_buf(),
            source,
        };

        let mut file = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        file.write_all(bytes).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        file.persist(target).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
