//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot storage backends and
//! associated error types.

use crate::storage::SiteMetadata;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid site key: {0}")]
    InvalidSiteKey(String),

    #[error("Invalid snapshot id: {0}")]
    InvalidSnapshotId(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for snapshot storage backends
///
/// Snapshots are immutable once written. Metadata is replaced as a whole
/// record, and a reader must only ever see the previous or the new record.
pub trait Storage: Send + Sync {
    /// Stores a fetched body and returns its new snapshot id
    fn write_snapshot(&self, site_key: &str, url: &Url, body: &[u8]) -> StorageResult<String>;

    /// Loads a site's metadata
    ///
    /// A missing or unreadable record yields empty metadata; it is rebuilt on
    /// the next successful save.
    fn load_metadata(&self, site_key: &str) -> SiteMetadata;

    /// Replaces a site's metadata record
    fn save_metadata(&self, site_key: &str, metadata: &SiteMetadata) -> StorageResult<()>;

    /// Deletes one snapshot; deleting a missing snapshot is not an error
    fn delete_snapshot(&self, site_key: &str, snapshot_id: &str) -> StorageResult<()>;
}
