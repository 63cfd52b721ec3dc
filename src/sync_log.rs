//! Sync log: one entry per item processed by a sync run.
//!
//! Entries are append-only. A sink receives each entry once it is final;
//! [`JsonLinesSyncLog`] writes one JSON object per line so logs from many
//! runs can simply be concatenated.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::search::{SearchOutcome, SearchReport};

/// Lifecycle of a sync log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Queued,
    Downloading,
    Success,
    Error,
    NotFound,
}

impl SyncStatus {
    /// Whether the entry can still change
    pub fn is_final(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::NotFound)
    }
}

/// One item of a sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Source item id
    pub id: String,
    /// Human readable names (artist, title, ...)
    pub names: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub error: Option<String>,
}

impl SyncLogEntry {
    /// A new queued entry, started now
    pub fn start(id: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            id: id.into(),
            names,
            start: Utc::now(),
            end: None,
            status: SyncStatus::Queued,
            error: None,
        }
    }

    pub fn downloading(&mut self) {
        self.status = SyncStatus::Downloading;
    }

    /// Finalize with `status` and set the end time
    pub fn finish(&mut self, status: SyncStatus) {
        self.status = status;
        self.end = Some(Utc::now());
    }

    /// Finalize as failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(SyncStatus::Error);
    }
}

impl SearchReport {
    /// A finalized sync log entry for this search
    pub fn to_sync_entry(&self) -> SyncLogEntry {
        let mut entry = SyncLogEntry::start(
            self.id.clone(),
            vec![self.artist.clone(), self.title.clone()],
        );
        match self.outcome() {
            SearchOutcome::Matched => entry.finish(SyncStatus::Success),
            SearchOutcome::NotFound => {
                match self.queries.iter().rev().find_map(|q| q.error.clone()) {
                    Some(error) if self.queries.iter().all(|q| q.error.is_some()) => {
                        entry.fail(error)
                    }
                    _ => entry.finish(SyncStatus::NotFound),
                }
            }
        }
        entry
    }
}

/// Errors writing the sync log
#[derive(Debug, thiserror::Error)]
pub enum SyncLogError {
    #[error("Sync log I/O error on {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Failed to serialize sync log entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for sync log entries
pub trait SyncLogSink: Send + Sync {
    fn append(&self, entry: &SyncLogEntry) -> Result<(), SyncLogError>;
}

/// Keeps entries in memory
#[derive(Debug, Default)]
pub struct MemorySyncLog {
    entries: Mutex<Vec<SyncLogEntry>>,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every appended entry, oldest first
    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().clone()
    }
}

impl SyncLogSink for MemorySyncLog {
    fn append(&self, entry: &SyncLogEntry) -> Result<(), SyncLogError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Appends entries to a file, one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSyncLog {
    path: PathBuf,
    // Serializes writers within the process
    lock: Mutex<()>,
}

impl JsonLinesSyncLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back; unparsable lines are skipped with a warning
    pub fn read_all(&self) -> Result<Vec<SyncLogEntry>, SyncLogError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SyncLogError::Io(self.path.clone(), e)),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(path = ?self.path, error = %e, "Skipping bad sync log line");
                    None
                }
            })
            .collect())
    }
}

impl SyncLogSink for JsonLinesSyncLog {
    fn append(&self, entry: &SyncLogEntry) -> Result<(), SyncLogError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock();
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|e| SyncLogError::Io(self.path.clone(), e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SyncLogError::Io(self.path.clone(), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| SyncLogError::Io(self.path.clone(), e))
    }
}
