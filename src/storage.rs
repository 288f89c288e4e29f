// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device-local persistence.
//!
//! Two small JSON files under the configured data directory:
//! - the live tracking session (coordinates + start time), so an active run
//!   survives a process restart;
//! - the offline capture queue, which survives indefinitely until replayed.
//!
//! A corrupt file is treated as absent (with a warning) rather than an
//! error: losing a recovery log is preferable to wedging the tracker.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::capture::OfflineCaptureRecord;
use crate::models::territory::Coordinate;

const SESSION_FILE: &str = "tracking_session.json";
const QUEUE_FILE: &str = "offline_queue.json";

/// Errors from device storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: String,
        source: serde_json::Error,
    },
}

/// A persisted background tracking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub coords: Vec<Coordinate>,
    pub started_at: DateTime<Utc>,
}

/// File-backed store for the live tracking session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_FILE),
        }
    }

    /// Load the persisted session, if one exists. Corrupt data is dropped.
    pub fn load(&self) -> Option<PersistedSession> {
        read_json(&self.path)
    }

    pub fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        write_json(&self.path, session)
    }

    /// Append one background fix to the persisted log.
    pub fn append_fix(&self, fix: Coordinate) -> Result<(), StorageError> {
        let mut session = match self.load() {
            Some(s) => s,
            // No session on disk means tracking never started (or was
            // reset); drop the fix.
            None => return Ok(()),
        };
        session.coords.push(fix);
        self.save(&session)
    }

    /// Remove any persisted session.
    pub fn clear(&self) {
        remove_file(&self.path);
    }
}

/// File-backed store for the offline capture queue.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(QUEUE_FILE),
        }
    }

    /// Load all queued records. A missing or corrupt file is an empty queue.
    pub fn load(&self) -> Vec<OfflineCaptureRecord> {
        read_json(&self.path).unwrap_or_default()
    }

    /// Rewrite the whole queue.
    pub fn save(&self, records: &[OfflineCaptureRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            remove_file(&self.path);
            return Ok(());
        }
        write_json(&self.path, &records.to_vec())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return None,
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt local file, treating as absent");
            None
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::Write {
            path: path.display().to_string(),
            source,
        })?;
    }
    let encoded = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, encoded).map_err(|source| StorageError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn remove_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove local file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        assert!(store.load().is_none());

        let session = PersistedSession {
            coords: vec![Coordinate::new(48.0, 11.0)],
            started_at: Utc::now(),
        };
        store.save(&session).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.coords.len(), 1);

        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_append_fix_without_session_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        store.append_fix(Coordinate::new(48.0, 11.0)).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_append_fix_extends_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store
            .save(&PersistedSession {
                coords: vec![],
                started_at: Utc::now(),
            })
            .unwrap();

        store.append_fix(Coordinate::new(48.0, 11.0)).unwrap();
        store.append_fix(Coordinate::new(48.001, 11.0)).unwrap();

        assert_eq!(store.load().unwrap().coords.len(), 2);
    }

    #[test]
    fn test_corrupt_session_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_empty_queue_save_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path());

        assert!(store.load().is_empty());
        store.save(&[]).unwrap();
        assert!(!dir.path().join(QUEUE_FILE).exists());
    }
}
