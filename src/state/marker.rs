use crate::storage::{write_atomic, StorageResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// The run-complete marker file
///
/// Holds a single ISO-8601 UTC timestamp, overwritten at the end of every
/// crawl cycle. The scooper treats an advance of this value as "new corpus".
#[derive(Debug, Clone)]
pub struct RunMarker {
    path: PathBuf,
}

impl RunMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the marker with `at`
    pub fn write(&self, at: DateTime<Utc>) -> StorageResult<()> {
        write_atomic(&self.path, format!("{}\n", at.to_rfc3339()).as_bytes())
    }

    /// Reads the marker's timestamp
    ///
    /// Falls back to the file's modification time when the content does not
    /// parse. A missing marker yields `None`.
    pub fn read(&self) -> Option<DateTime<Utc>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => std::fs::metadata(&self.path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from),
        }
    }
}
