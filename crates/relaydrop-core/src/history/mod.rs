//! Transfer history.
//!
//! Every finished upload and download is recorded with its peer, file and
//! outcome. Entries are kept newest first in a JSON file under the
//! platform data directory, pruned to `max_entries` and aged out after
//! `auto_clear_days`.
//!
//! The client task and the download tasks share one store through a
//! [`Journal`]. Recording is best effort: a failure to persist is logged
//! and never interrupts a transfer.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::error::{Error, Result};
use crate::session::ClientId;

const HISTORY_FORMAT_VERSION: u32 = 1;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// We uploaded the file
    Sent,
    /// We downloaded the file
    Received,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "Sent"),
            Self::Received => write!(f, "Received"),
        }
    }
}

/// Final state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// All bytes went through
    Completed,
    /// The request failed
    Failed,
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// A single transfer history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHistoryEntry {
    /// Unique identifier for this entry
    pub id: Uuid,
    /// Unix timestamp when the transfer started
    pub timestamp: u64,
    /// Direction of the transfer
    pub direction: TransferDirection,
    /// The other client
    pub peer: ClientId,
    /// File name as offered
    pub file_name: String,
    /// Offered size in bytes
    pub size: u64,
    /// Bytes actually moved
    pub bytes_transferred: u64,
    /// Final state
    pub state: TransferState,
    /// Duration in seconds
    pub duration_secs: u64,
    /// Average speed in bytes per second (if the transfer took time)
    pub speed_bps: Option<u64>,
    /// Where a received file was written
    pub output_path: Option<PathBuf>,
    /// Error message (if failed)
    pub error_message: Option<String>,
}

impl TransferHistoryEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(
        direction: TransferDirection,
        peer: ClientId,
        file_name: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: unix_now(),
            direction,
            peer,
            file_name: file_name.into(),
            size,
            bytes_transferred: 0,
            state: TransferState::Completed,
            duration_secs: 0,
            speed_bps: None,
            output_path: None,
            error_message: None,
        }
    }

    /// Set the start time from a duration already elapsed.
    #[must_use]
    pub fn started(mut self, elapsed: Duration) -> Self {
        self.timestamp = self.timestamp.saturating_sub(elapsed.as_secs());
        self.duration_secs = elapsed.as_secs();
        if let Some(speed) = speed(self.bytes_transferred, elapsed) {
            self.speed_bps = Some(speed);
        }
        self
    }

    /// Set the number of bytes moved.
    #[must_use]
    pub fn with_bytes(mut self, bytes_transferred: u64) -> Self {
        self.bytes_transferred = bytes_transferred;
        if self.duration_secs > 0 {
            self.speed_bps = Some(bytes_transferred / self.duration_secs);
        }
        self
    }

    /// Set the received file's location.
    #[must_use]
    pub fn with_output_path(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }

    /// Mark the transfer failed.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self.state = TransferState::Failed;
        self
    }

    /// The timestamp as a human-readable string.
    #[must_use]
    pub fn formatted_timestamp(&self) -> String {
        use chrono::{DateTime, Local, Utc};
        let timestamp_i64 = i64::try_from(self.timestamp).unwrap_or(i64::MAX);
        DateTime::<Utc>::from_timestamp(timestamp_i64, 0).map_or_else(
            || "Unknown".to_string(),
            |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        )
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn speed(bytes: u64, elapsed: Duration) -> Option<u64> {
    let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    (millis > 0).then(|| bytes.saturating_mul(1000) / millis)
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryDatabase {
    version: u32,
    entries: Vec<TransferHistoryEntry>,
}

/// Persistent transfer history.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    /// Newest first
    entries: Vec<TransferHistoryEntry>,
    config: HistoryConfig,
}

impl HistoryStore {
    /// Load the store from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing store cannot be read.
    pub fn load_with_config(config: HistoryConfig) -> Result<Self> {
        let path = Self::default_path().unwrap_or_else(|| PathBuf::from("history.json"));
        Self::load_from(path, config)
    }

    /// Load from a specific path. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: PathBuf, config: HistoryConfig) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path,
                entries: Vec::new(),
                config,
            });
        }

        let file = fs::File::open(&path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to open history store at {}: {}",
                path.display(),
                e
            ))
        })?;

        let db: HistoryDatabase = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to parse history store at {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut store = Self {
            path,
            entries: db.entries,
            config,
        };
        store.apply_auto_clear();

        Ok(store)
    }

    /// Default store location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "relaydrop", "Relaydrop")
            .map(|dirs| dirs.data_dir().join("history.json"))
    }

    /// Write the store to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!(
                    "Failed to create history store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = HistoryDatabase {
            version: HISTORY_FORMAT_VERSION,
            entries: self.entries.clone(),
        };

        let file = fs::File::create(&self.path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to create history store at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::to_writer_pretty(BufWriter::new(file), &db)?;
        Ok(())
    }

    /// Record an entry (newest first), pruning to `max_entries`, and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn add(&mut self, entry: TransferHistoryEntry) -> Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(self.config.max_entries);
        self.save()
    }

    /// Up to `limit` most recent entries.
    #[must_use]
    pub fn list(&self, limit: Option<usize>) -> &[TransferHistoryEntry] {
        limit.map_or_else(
            || &self.entries[..],
            |n| &self.entries[..n.min(self.entries.len())],
        )
    }

    /// Entry by index (0 = most recent).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TransferHistoryEntry> {
        self.entries.get(index)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    /// Store file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn apply_auto_clear(&mut self) {
        let Some(days) = self.config.auto_clear_days else {
            return;
        };
        let cutoff = unix_now().saturating_sub(u64::from(days) * 24 * 60 * 60);

        let len_before = self.entries.len();
        self.entries.retain(|e| e.timestamp >= cutoff);

        if self.entries.len() < len_before {
            tracing::debug!(
                removed = len_before - self.entries.len(),
                "Auto-cleared old history entries"
            );
        }
    }
}

/// Shared, best-effort handle to a [`HistoryStore`].
#[derive(Debug, Clone)]
pub struct Journal {
    store: Arc<Mutex<HistoryStore>>,
}

impl Journal {
    /// Share `store` between the client and download tasks.
    #[must_use]
    pub fn new(store: HistoryStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Open the journal described by `config`, or `None` when history is
    /// disabled or unreadable.
    #[must_use]
    pub fn open(config: &HistoryConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match HistoryStore::load_with_config(config.clone()) {
            Ok(store) => Some(Self::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "Transfer history unavailable");
                None
            }
        }
    }

    /// Record an entry, logging instead of failing.
    pub fn record(&self, entry: TransferHistoryEntry) {
        let Ok(mut store) = self.store.lock() else {
            tracing::warn!("Transfer history lock poisoned; entry dropped");
            return;
        };
        tracing::debug!(
            direction = %entry.direction,
            peer = %entry.peer,
            file = %entry.file_name,
            state = %entry.state,
            "Recording transfer"
        );
        if let Err(e) = store.add(entry) {
            tracing::warn!(error = %e, "Failed to save transfer history");
        }
    }

    /// Copy of the most recent entries.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<TransferHistoryEntry> {
        self.store
            .lock()
            .map(|store| store.list(Some(limit)).to_vec())
            .unwrap_or_default()
    }
}
