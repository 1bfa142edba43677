//! JSON export of persisted records

use crate::storage::RecordStore;
use crate::HarvestError;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes every stored record, rank-ordered, as a pretty-printed JSON array
///
/// The file is written next to `path` and renamed into place, so readers
/// never observe a half-written export.
///
/// # Returns
///
/// The number of records written
pub fn export_json(storage: &dyn RecordStore, path: &Path) -> Result<usize, HarvestError> {
    let records = storage.list_records()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &records).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    file.persist(path).map_err(|e| e.error)?;

    tracing::info!("Exported {} records to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{record_id, PersistedRecord};
    use crate::storage::SqliteStorage;
    use chrono::Utc;

    #[test]
    fn test_export_writes_rank_ordered_array() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for (name, rank) in [("Forrest Gump", 3), ("Shawshank Redemption", 1)] {
            storage
                .upsert_record(&PersistedRecord {
                    id: record_id(name),
                    rank,
                    name: name.to_string(),
                    directors: String::new(),
                    writers: String::new(),
                    actors: String::new(),
                    genre: "Drama".to_string(),
                    country: String::new(),
                    release_date: String::new(),
                    rating: "9.5".to_string(),
                    asset_url: None,
                    update_time: Utc::now(),
                })
                .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("films.json");
        let written = export_json(&storage, &path).unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "Shawshank Redemption");
        assert_eq!(items[0]["id"], record_id("Shawshank Redemption"));
        assert_eq!(items[1]["genre"], "Drama");
    }

    #[test]
    fn test_export_empty_store() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("films.json");

        assert_eq!(export_json(&storage, &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
