//! Write-to-temporary-then-rename helpers
//!
//! Every file that another process may read while it is being rewritten
//! (site metadata, the dead ledger, the results store, the run marker) goes
//! through [`write_atomic`].

use crate::storage::{StorageError, StorageResult};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replaces `path` with `contents` atomically
///
/// The bytes are written and synced to a sibling temporary file which is then
/// renamed over the target. If anything fails the target keeps its previous
/// content and the temporary file is removed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let temp = temp_path(path);
    let result = write_and_sync(&temp, contents)
        .and_then(|()| fs::rename(&temp, path))
        .map_err(|e| StorageError::io(path, e));

    if result.is_err() && temp.exists() {
        let _ = fs::remove_file(&temp);
    }

    result
}

/// Serializes `value` as pretty JSON and writes it atomically
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

fn write_and_sync(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Temporary sibling of `path`, unique per process
fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}
