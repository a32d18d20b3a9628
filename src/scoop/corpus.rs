//! Corpus index over the crawler's snapshot tree

use crate::storage::{FileStorage, PageRecord, Storage};
use std::collections::HashSet;
use std::path::PathBuf;

/// One searchable snapshot file
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub site: String,
    /// `None` for files on disk that no metadata record lists
    pub page_url: Option<String>,
    pub snapshot_id: String,
    pub path: PathBuf,
    pub record: PageRecord,
}

/// Lists every current snapshot under the storage root
///
/// Listed snapshots come first, in metadata order, followed by unlisted
/// files found on disk. Listed files that no longer exist are skipped.
pub fn enumerate(storage: &FileStorage) -> Vec<CorpusEntry> {
    let mut entries = Vec::new();

    for site in storage.list_sites() {
        let metadata = storage.load_metadata(&site);
        let mut listed = HashSet::new();

        for (url, record) in &metadata.pages {
            for snapshot_id in &record.files {
                listed.insert(snapshot_id.clone());
                let path = storage.snapshot_path(&site, snapshot_id);
                if !path.is_file() {
                    tracing::debug!("Listed snapshot {} is missing", path.display());
                    continue;
                }
                entries.push(CorpusEntry {
                    site: site.clone(),
                    page_url: Some(url.clone()),
                    snapshot_id: snapshot_id.clone(),
                    path,
                    record: record.clone(),
                });
            }
        }

        for snapshot_id in storage.list_snapshots(&site) {
            if listed.contains(&snapshot_id) {
                continue;
            }
            entries.push(CorpusEntry {
                site: site.clone(),
                page_url: None,
                path: storage.snapshot_path(&site, &snapshot_id),
                snapshot_id,
                record: PageRecord::default(),
            });
        }
    }

    entries
}
