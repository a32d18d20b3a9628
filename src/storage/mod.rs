//! Storage module for persisting crawl data
//!
//! This module handles everything the crawler keeps on disk, including:
//! - Immutable page snapshots, one file per fetch
//! - One metadata record per site with each page's version history
//! - Atomic replace for every file another process may read concurrently

mod atomic;
mod files;
mod schema;
mod traits;

pub use atomic::{write_atomic, write_json_atomic};
pub use files::{FileStorage, METADATA_FILE, SNAPSHOT_DIR, SNAPSHOT_EXT};
pub use schema::{PageRecord, SiteMetadata};
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens the filesystem storage rooted at `path`
///
/// Nothing is created until the first snapshot or metadata write.
pub fn open_storage(path: &Path) -> FileStorage {
    FileStorage::new(path)
}
