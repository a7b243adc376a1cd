// Bounded session history, persisted as one JSON blob on disk.
//
// Newest-first, capped by insertion order (append-then-trim, not LRU).
// Called synchronously from the control task only.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::protocol::{ExtractedEntities, Language};

/// Maximum number of records retained; inserting past the cap evicts the
/// oldest.
pub const HISTORY_CAPACITY: usize = 50;

/// One completed session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Session id the record was created from
    pub id: String,
    /// Final transcript text
    pub text: String,
    /// Extracted terms by category
    pub terms: ExtractedEntities,
    /// Recording language
    pub language: Language,
    /// When the session completed
    pub timestamp: DateTime<Utc>,
}

pub struct HistoryStore {
    path: PathBuf,
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    /// Open the store at `path`, loading existing records if the file is
    /// present. A missing file is an empty history, not an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read history file: {:?}", path))?;
            match serde_json::from_str::<Vec<HistoryRecord>>(&contents) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Discarding unreadable history file: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!("History store opened: {} records at {:?}", records.len(), path);

        Ok(Self { path, records })
    }

    /// Prepend a record, trim to capacity, persist.
    pub fn append(&mut self, record: HistoryRecord) -> Result<()> {
        self.records.insert(0, record);
        self.records.truncate(HISTORY_CAPACITY);
        self.save()
    }

    /// Delete the record with the given id, if present.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        if self.records.len() != before {
            self.save()?;
        }
        Ok(())
    }

    /// Delete all records.
    pub fn clear(&mut self) -> Result<()> {
        if self.records.is_empty() {
            return Ok(());
        }
        self.records.clear();
        self.save()
    }

    /// All records, newest first.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create history directory: {:?}", parent))?;
            }
        }

        let contents =
            serde_json::to_string_pretty(&self.records).context("Failed to encode history")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write history file: {:?}", self.path))?;

        Ok(())
    }
}
