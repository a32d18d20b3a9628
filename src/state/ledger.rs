//! Dead-site ledger
//!
//! A JSON map `site_key -> {marked_at, until, reason}` shared between the
//! crawler (the only writer) and the scooper (read-only). Expiry is lazy: an
//! elapsed entry is only removed when somebody asks about that site.

use crate::config::MAX_RETRY_HOURS;
use crate::storage::{write_json_atomic, StorageResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One excluded site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadEntry {
    pub marked_at: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub reason: String,
}

impl DeadEntry {
    /// True while the exclusion window is open
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}

/// The dead-site ledger and the file it is persisted to
#[derive(Debug, Clone)]
pub struct DeadLedger {
    path: PathBuf,
    entries: BTreeMap<String, DeadEntry>,
}

impl DeadLedger {
    /// Loads the ledger from `path`
    ///
    /// A missing or corrupt file yields an empty ledger; the next write
    /// replaces it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, DeadEntry> {
        &self.entries
    }

    pub fn get(&self, site_key: &str) -> Option<&DeadEntry> {
        self.entries.get(site_key)
    }

    /// Returns true if the site is currently excluded from crawling
    ///
    /// An entry whose window has elapsed is removed and the ledger persisted
    /// before returning `false`.
    pub fn is_dead(&mut self, site_key: &str) -> bool {
        self.is_dead_at(site_key, Utc::now())
    }

    /// [`DeadLedger::is_dead`] against an explicit clock
    pub fn is_dead_at(&mut self, site_key: &str, now: DateTime<Utc>) -> bool {
        let until = match self.entries.get(site_key) {
            None => return false,
            Some(entry) if entry.is_active(now) => return true,
            Some(entry) => entry.until,
        };

        tracing::info!(
            "Site {} is back after dead window ending {}",
            site_key,
            until.to_rfc3339()
        );
        if let Err(e) = self.update(|entries| {
            entries.remove(site_key);
        }) {
            tracing::error!("Failed to persist dead ledger: {}", e);
        }
        false
    }

    /// Read-only liveness check that never prunes or writes
    pub fn is_marked_dead(&self, site_key: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(site_key)
            .map(|entry| entry.is_active(now))
            .unwrap_or(false)
    }

    /// Excludes a site for `retry_after`, at most ten years, and persists the ledger
    pub fn mark_dead(
        &mut self,
        site_key: &str,
        reason: &str,
        retry_after: Duration,
    ) -> StorageResult<DeadEntry> {
        self.mark_dead_at(site_key, reason, retry_after, Utc::now())
    }

    /// [`DeadLedger::mark_dead`] against an explicit clock
    pub fn mark_dead_at(
        &mut self,
        site_key: &str,
        reason: &str,
        retry_after: Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<DeadEntry> {
        let entry = DeadEntry {
            marked_at: now,
            until: now + retry_after.min(max_retry_window()),
            reason: reason.to_string(),
        };
        tracing::warn!(
            "Marking site {} dead until {}: {}",
            site_key,
            entry.until.to_rfc3339(),
            reason
        );
        let inserted = entry.clone();
        self.update(move |entries| {
            entries.insert(site_key.to_string(), inserted);
        })?;
        Ok(entry)
    }

    /// Writes the in-memory ledger to disk
    pub fn save(&self) -> StorageResult<()> {
        write_json_atomic(&self.path, &self.entries)
    }

    /// Re-reads the file, applies `change`, and writes it back
    ///
    /// Starting from the on-disk state keeps entries written by another
    /// crawler since this ledger was loaded.
    fn update(&mut self, change: impl FnOnce(&mut BTreeMap<String, DeadEntry>)) -> StorageResult<()> {
        let mut entries = read_entries(&self.path);
        change(&mut entries);
        self.entries = entries;
        self.save()
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, DeadEntry> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!("Cannot read dead ledger {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::warn!("Corrupt dead ledger {}: {}; starting empty", path.display(), e);
        BTreeMap::new()
    })
}

fn max_retry_window() -> Duration {
    Duration::hours(MAX_RETRY_HOURS as i64)
}
