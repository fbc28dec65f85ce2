//! Deduplicated, size-bounded history of downloads and online playback.
//!
//! The backing file is a JSON array of [`HistoryRecord`]s, rewritten whole on
//! every change. Records are identified by `(title, url)`; the most recent
//! occurrence of a key wins and the list never exceeds
//! [`MAX_HISTORY_ENTRIES`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Maximum number of records kept on disk.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Default history file name inside the base directory.
pub const HISTORY_FILE_NAME: &str = "history_online.json";

/// Identity key of a record: `(title, url)`.
pub type HistoryKey = (String, String);

/// A single history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Media title.
    #[serde(default)]
    pub title: String,
    /// Source URL.
    #[serde(default)]
    pub url: String,
    /// ISO-8601 timestamp of the action.
    #[serde(default)]
    pub timestamp: String,
}

impl HistoryRecord {
    /// Create a record stamped with the current local time.
    pub fn now(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            timestamp: Local::now().to_rfc3339(),
        }
    }

    /// The identity key of this record.
    #[must_use]
    pub fn key(&self) -> HistoryKey {
        (self.title.clone(), self.url.clone())
    }

    fn has_key(&self, title: &str, url: &str) -> bool {
        self.title == title && self.url == url
    }
}

/// Keep only the last occurrence of each key, preserving relative order.
#[must_use]
pub fn dedup_keep_latest(records: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    let mut seen = HashSet::new();
    let mut kept: Vec<HistoryRecord> = records
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.key()))
        .collect();
    kept.reverse();
    kept
}

/// Persistent history store.
///
/// `append`, `remove` and `clear` are serialized through an internal lock so
/// concurrent workers in one process cannot lose each other's updates.
pub struct HistoryStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Open a store backed by the real file system.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, Arc::new(RealFileSystem))
    }

    /// Open a store over a custom file system.
    pub fn with_fs(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records as stored, with no dedup. Missing or malformed files read as empty.
    fn load_raw(&self) -> Vec<HistoryRecord> {
        let content = match self.fs.read_to_string(&self.path) {
            Ok(content) => content,
            Err(Error::FileSystem(FileSystemError::NotFound { .. })) => return Vec::new(),
            Err(e) => {
                warn!(context = "History", "Failed to read history: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    context = "History",
                    "History file {} is malformed, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn persist(&self, records: &[HistoryRecord]) -> Result<()> {
        let persist_error = |reason: String| Error::HistoryPersist {
            path: self.path.clone(),
            reason,
        };
        let content =
            serde_json::to_string_pretty(records).map_err(|e| persist_error(e.to_string()))?;
        self.fs
            .write_atomic(&self.path, &content)
            .map_err(|e| persist_error(e.to_string()))
    }

    /// Deduplicated records, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<HistoryRecord> {
        dedup_keep_latest(self.load_raw())
    }

    /// Append a record, moving an existing key to the end and capping the size.
    pub fn append(&self, record: HistoryRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records: Vec<HistoryRecord> = dedup_keep_latest(self.load_raw())
            .into_iter()
            .filter(|existing| !existing.has_key(&record.title, &record.url))
            .collect();
        records.push(record);

        if records.len() > MAX_HISTORY_ENTRIES {
            let overflow = records.len() - MAX_HISTORY_ENTRIES;
            records.drain(..overflow);
        }

        self.persist(&records)?;
        debug!(entries = records.len(), "history updated");
        Ok(())
    }

    /// Convenience wrapper stamping `now` as the timestamp.
    pub fn record(&self, title: &str, url: &str) -> Result<HistoryRecord> {
        let record = HistoryRecord::now(title, url);
        self.append(record.clone())?;
        Ok(record)
    }

    /// Rewrite the store without the given keys. Returns how many were removed.
    pub fn remove(&self, keys: &HashSet<HistoryKey>) -> Result<usize> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let records = dedup_keep_latest(self.load_raw());
        let before = records.len();
        let kept: Vec<HistoryRecord> = records
            .into_iter()
            .filter(|record| !keys.contains(&record.key()))
            .collect();
        let removed = before - kept.len();

        self.persist(&kept)?;
        info!("Removed {} history entries", removed);
        Ok(removed)
    }

    /// Remove every record.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.persist(&[])
    }
}
