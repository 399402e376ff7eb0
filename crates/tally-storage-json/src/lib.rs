//! tally-storage-json
//!
//! Filesystem-backed JSON implementation of [`EntryStore`]. Each collection lives
//! in its own file inside a data directory; the previous file is rotated into a
//! `backups/` directory before every overwrite.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::{CoreError, EntryStore};
use tally_domain::Entry;

pub const SCHEMA_VERSION: u32 = 1;
const FILE_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%3f";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// The two persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Committed,
    Pending,
}

impl Collection {
    fn file_stem(self) -> &'static str {
        match self {
            Collection::Committed => "committed",
            Collection::Pending => "pending",
        }
    }
}

#[derive(Serialize)]
struct StoredCollectionRef<'a> {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    entries: &'a [Entry],
}

#[derive(Deserialize)]
struct StoredCollection {
    schema_version: u32,
    entries: Vec<Entry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Versioned(StoredCollection),
    Legacy(Vec<Entry>),
}

/// JSON files for committed and pending entries, plus rotated backups.
#[derive(Debug, Clone)]
pub struct JsonEntryStore {
    data_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonEntryStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, CoreError> {
        Self::with_retention(data_dir, DEFAULT_RETENTION)
    }

    pub fn with_retention(data_dir: PathBuf, retention: usize) -> Result<Self, CoreError> {
        let backups_dir = data_dir.join("backups");
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&backups_dir)?;
        Ok(Self {
            data_dir,
            backups_dir,
            retention: retention.max(1),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", collection.file_stem(), FILE_EXTENSION))
    }

    /// Lists rotated backups for a collection, newest first.
    pub fn list_backups(&self, collection: Collection) -> Result<Vec<PathBuf>, CoreError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}_", collection.file_stem());
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                if name.starts_with(&prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort_by(|a, b| b.cmp(a));
        Ok(names
            .into_iter()
            .map(|name| self.backups_dir.join(name))
            .collect())
    }

    fn load(&self, collection: Collection) -> Result<Vec<Entry>, CoreError> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let raw: Value =
            serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))?;
        if let Some(found) = raw.get("schema_version").and_then(Value::as_u64) {
            if found > u64::from(SCHEMA_VERSION) {
                return Err(CoreError::UnsupportedSchema {
                    found: u32::try_from(found).unwrap_or(u32::MAX),
                    supported: SCHEMA_VERSION,
                });
            }
        }
        let layout: StoredLayout =
            serde_json::from_value(raw).map_err(|err| CoreError::Serde(err.to_string()))?;
        match layout {
            StoredLayout::Versioned(stored) => {
                tracing::trace!(schema_version = stored.schema_version, "collection loaded");
                Ok(stored.entries)
            }
            StoredLayout::Legacy(entries) => {
                tracing::warn!(
                    path = %path.display(),
                    "loaded unversioned collection; it will be rewritten on next save"
                );
                Ok(entries)
            }
        }
    }

    fn save(&self, collection: Collection, entries: &[Entry]) -> Result<(), CoreError> {
        let path = self.collection_path(collection);
        if path.exists() {
            self.backup_existing_file(collection, &path)?;
        }
        let stored = StoredCollectionRef {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            entries,
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|err| CoreError::Serde(err.to_string()))?;
        let tmp = tmp_path(&path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "collection saved"
        );
        Ok(())
    }

    fn backup_existing_file(&self, collection: Collection, path: &Path) -> Result<(), CoreError> {
        fs::create_dir_all(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        fs::copy(path, self.free_backup_path(collection, &timestamp))?;
        self.prune_backups(collection)
    }

    /// Backups taken within the same millisecond get a counter suffix, which
    /// still sorts after the unsuffixed name.
    fn free_backup_path(&self, collection: Collection, timestamp: &str) -> PathBuf {
        let stem = collection.file_stem();
        let mut candidate = self
            .backups_dir
            .join(format!("{}_{}.{}", stem, timestamp, FILE_EXTENSION));
        let mut attempt = 0u32;
        while candidate.exists() {
            attempt += 1;
            candidate = self.backups_dir.join(format!(
                "{}_{}_{:03}.{}",
                stem, timestamp, attempt, FILE_EXTENSION
            ));
        }
        candidate
    }

    fn prune_backups(&self, collection: Collection) -> Result<(), CoreError> {
        for stale in self.list_backups(collection)?.into_iter().skip(self.retention) {
            let _ = fs::remove_file(stale);
        }
        Ok(())
    }
}

impl EntryStore for JsonEntryStore {
    fn load_committed(&self) -> Result<Vec<Entry>, CoreError> {
        self.load(Collection::Committed)
    }

    fn save_committed(&self, entries: &[Entry]) -> Result<(), CoreError> {
        self.save(Collection::Committed, entries)
    }

    fn load_pending(&self) -> Result<Vec<Entry>, CoreError> {
        self.load(Collection::Pending)
    }

    fn save_pending(&self, entries: &[Entry]) -> Result<(), CoreError> {
        self.save(Collection::Pending, entries)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_millisecond_backups_do_not_collide() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonEntryStore::with_retention(dir.path().to_path_buf(), 10).expect("store");
        let stamp = "20250101_000000000";

        let mut taken = Vec::new();
        for _ in 0..3 {
            let path = store.free_backup_path(Collection::Pending, stamp);
            assert!(!taken.contains(&path));
            fs::write(&path, "[]").expect("write backup");
            taken.push(path);
        }

        taken.reverse();
        assert_eq!(store.list_backups(Collection::Pending).expect("list"), taken);
    }
}
