//! On-disk records shared by the crawler and the scooper
//!
//! One `metadata.json` per site directory holds a [`SiteMetadata`]. The crawler
//! is the only writer; the scooper reads it to find the current snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-site metadata: canonical page URL to its record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(default)]
    pub pages: BTreeMap<String, PageRecord>,
}

impl SiteMetadata {
    /// Returns the record for `url`, creating an empty one if needed
    pub fn page_mut(&mut self, url: &str) -> &mut PageRecord {
        self.pages.entry(url.to_string()).or_default()
    }

    /// Total number of snapshot files referenced by all pages
    pub fn snapshot_count(&self) -> usize {
        self.pages.values().map(|p| p.files.len()).sum()
    }
}

/// Version history and last-fetch state of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Snapshot ids, newest first
    #[serde(default)]
    pub files: Vec<String>,

    /// Set when the page answered with an archive code; freezes `files`
    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub content_hash: Option<String>,

    #[serde(default)]
    pub status_code: Option<u16>,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl PageRecord {
    /// Makes `snapshot_id` the newest snapshot
    ///
    /// An id already present is moved to the front rather than duplicated.
    pub fn push_snapshot(&mut self, snapshot_id: String) {
        self.files.retain(|f| f != &snapshot_id);
        self.files.insert(0, snapshot_id);
    }

    /// Drops the oldest snapshots beyond `max_versions` and returns them
    ///
    /// Archived pages are never pruned; the returned list is then empty.
    pub fn prune(&mut self, max_versions: usize) -> Vec<String> {
        if self.archived || self.files.len() <= max_versions {
            return Vec::new();
        }
        self.files.split_off(max_versions)
    }
}
