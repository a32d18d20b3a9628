//! Results store written by the keyword watch engine

use crate::config::MAX_HISTORY_ENTRIES;
use crate::storage::{write_json_atomic, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// One keyword occurrence in one snapshot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub site: String,
    #[serde(default)]
    pub url: Option<String>,
    pub file: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub snippets: Vec<String>,
    pub found_at: DateTime<Utc>,
}

/// Latest search result for one keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordResult {
    pub last_searched_at: DateTime<Utc>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// What caused a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Keywords were added to the keyword file
    Keywords,
    /// The crawler finished a cycle
    RunComplete,
    /// Requested from the command line
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keywords => write!(f, "keywords"),
            Self::RunComplete => write!(f, "run_complete"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub trigger: Trigger,
    #[serde(default)]
    pub updated_keywords: Vec<String>,
}

/// The whole results file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsStore {
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keywords: BTreeMap<String, KeywordResult>,
    /// Newest first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// One search's worth of changes to apply
#[derive(Debug)]
pub struct Merge<'a> {
    pub results: BTreeMap<String, Vec<Hit>>,
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
    pub history_limit: usize,
    /// When set, entries for keywords outside this list are dropped
    pub keep_only: Option<&'a [String]>,
}

impl ResultsStore {
    /// Loads the store; a missing or corrupt file yields an empty store
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No results store at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Results store {} is unreadable ({}); starting fresh",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        write_json_atomic(path, self)
    }

    /// Replaces the searched keywords' entries and logs the search
    ///
    /// Entries for keywords not in `merge.results` are left untouched unless
    /// `keep_only` excludes them.
    pub fn merge(&mut self, merge: Merge<'_>) {
        let mut updated: Vec<String> = Vec::with_capacity(merge.results.len());
        for (keyword, hits) in merge.results {
            updated.push(keyword.clone());
            self.keywords.insert(
                keyword,
                KeywordResult {
                    last_searched_at: merge.at,
                    hits,
                },
            );
        }

        if let Some(keep) = merge.keep_only {
            let before = self.keywords.len();
            self.keywords.retain(|k, _| keep.iter().any(|kept| kept == k));
            let dropped = before - self.keywords.len();
            if dropped > 0 {
                tracing::info!("Dropped results for {} removed keyword(s)", dropped);
            }
        }

        self.last_run = Some(merge.at);
        self.history.insert(
            0,
            HistoryEntry {
                ts: merge.at,
                trigger: merge.trigger,
                updated_keywords: updated,
            },
        );
        self.history
            .truncate(merge.history_limit.min(MAX_HISTORY_ENTRIES));
    }

    /// Total hits across all keywords
    pub fn hit_count(&self) -> usize {
        self.keywords.values().map(|r| r.hits.len()).sum()
    }
}
