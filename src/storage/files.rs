//! Directory-per-site storage backend
//!
//! ```text
//! <root>/<site-key>/metadata.json
//! <root>/<site-key>/html/<snapshot-id>
//! ```

use crate::storage::atomic::write_json_atomic;
use crate::storage::{SiteMetadata, Storage, StorageError, StorageResult};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use url::Url;

/// File name of the per-site metadata record
pub const METADATA_FILE: &str = "metadata.json";

/// Directory holding a site's snapshots
pub const SNAPSHOT_DIR: &str = "html";

/// Extension of snapshot files
pub const SNAPSHOT_EXT: &str = "html";

/// Filesystem storage rooted at the source directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn site_dir(&self, site_key: &str) -> PathBuf {
        self.root.join(site_key)
    }

    pub fn metadata_path(&self, site_key: &str) -> PathBuf {
        self.site_dir(site_key).join(METADATA_FILE)
    }

    pub fn snapshot_dir(&self, site_key: &str) -> PathBuf {
        self.site_dir(site_key).join(SNAPSHOT_DIR)
    }

    pub fn snapshot_path(&self, site_key: &str, snapshot_id: &str) -> PathBuf {
        self.snapshot_dir(site_key).join(snapshot_id)
    }

    /// Site keys with a directory under the root, sorted
    ///
    /// A missing root yields an empty list.
    pub fn list_sites(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut sites: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        sites.sort();
        sites
    }

    /// Snapshot ids present on disk for a site, sorted
    pub fn list_snapshots(&self, site_key: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.snapshot_dir(site_key)) else {
            return Vec::new();
        };

        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| is_snapshot_name(name))
            .collect();
        ids.sort();
        ids
    }

    fn check_site_key(site_key: &str) -> StorageResult<()> {
        if site_key.is_empty()
            || site_key == "."
            || site_key == ".."
            || site_key.contains(['/', '\\'])
        {
            return Err(StorageError::InvalidSiteKey(site_key.to_string()));
        }
        Ok(())
    }

    fn check_snapshot_id(snapshot_id: &str) -> StorageResult<()> {
        if !is_snapshot_name(snapshot_id) || snapshot_id.contains(['/', '\\']) {
            return Err(StorageError::InvalidSnapshotId(snapshot_id.to_string()));
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn write_snapshot(&self, site_key: &str, url: &Url, body: &[u8]) -> StorageResult<String> {
        Self::check_site_key(site_key)?;
        let dir = self.snapshot_dir(site_key);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let base = snapshot_base_name(url);
        let mut suffix = 0u32;
        loop {
            let id = if suffix == 0 {
                format!("{}.{}", base, SNAPSHOT_EXT)
            } else {
                format!("{}-{}.{}", base, suffix, SNAPSHOT_EXT)
            };
            let path = dir.join(&id);

            // create_new makes concurrent writers of the same id back off
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body)
                        .and_then(|()| file.sync_all())
                        .map_err(|e| {
                            let _ = fs::remove_file(&path);
                            StorageError::io(&path, e)
                        })?;
                    return Ok(id);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }
    }

    fn load_metadata(&self, site_key: &str) -> SiteMetadata {
        let path = self.metadata_path(site_key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return SiteMetadata::default(),
            Err(e) => {
                tracing::warn!("Cannot read {}: {}; starting empty", path.display(), e);
                return SiteMetadata::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Corrupt metadata {}: {}; starting empty", path.display(), e);
                SiteMetadata::default()
            }
        }
    }

    fn save_metadata(&self, site_key: &str, metadata: &SiteMetadata) -> StorageResult<()> {
        Self::check_site_key(site_key)?;
        write_json_atomic(&self.metadata_path(site_key), metadata)
    }

    fn delete_snapshot(&self, site_key: &str, snapshot_id: &str) -> StorageResult<()> {
        Self::check_site_key(site_key)?;
        Self::check_snapshot_id(snapshot_id)?;
        let path = self.snapshot_path(site_key, snapshot_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }
}

/// Timestamp plus a short hash of the canonical URL, without extension
fn snapshot_base_name(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%dT%H%M%S%6fZ"),
        &hex::encode(digest)[..12]
    )
}

fn is_snapshot_name(name: &str) -> bool {
    !name.starts_with('.')
        && Path::new(name)
            .extension()
            .map(|ext| ext == SNAPSHOT_EXT)
            .unwrap_or(false)
}
