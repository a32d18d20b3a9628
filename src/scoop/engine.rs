//! Keyword watch engine
//!
//! Polls two signals: the keyword file and the crawler's run-complete
//! marker. Added keywords are searched on their own; a marker advance
//! re-searches the whole list against the refreshed corpus.

use crate::config::{Config, PathsConfig, ScoopConfig};
use crate::scoop::corpus::enumerate;
use crate::scoop::keywords::KeywordSet;
use crate::scoop::results::{Merge, ResultsStore, Trigger};
use crate::scoop::search::{search, SnippetOptions};
use crate::scoop::signal::WatchedValue;
use crate::shutdown::Shutdown;
use crate::state::{DeadLedger, RunMarker};
use crate::storage::{FileStorage, StorageResult};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// What one search did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub trigger: Trigger,
    pub searched: Vec<String>,
    pub files_scanned: usize,
    pub hits: usize,
}

/// Watches keywords and the run-complete marker and keeps the results store current
pub struct WatchEngine {
    storage: FileStorage,
    keywords_path: PathBuf,
    results_path: PathBuf,
    ledger_path: PathBuf,
    marker: RunMarker,
    options: ScoopConfig,
    keywords: KeywordSet,
    marker_watch: WatchedValue<DateTime<Utc>>,
}

impl WatchEngine {
    /// Creates an engine with nothing observed yet, so the first poll
    /// searches every keyword
    pub fn new(paths: &PathsConfig, options: ScoopConfig) -> Self {
        Self {
            storage: FileStorage::new(&paths.source_dir),
            keywords_path: paths.keywords_file.clone(),
            results_path: paths.results_file.clone(),
            ledger_path: paths.ledger_path(),
            marker: RunMarker::new(paths.marker_path()),
            options,
            keywords: KeywordSet::new(),
            marker_watch: WatchedValue::advancing(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paths, config.scoop.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.options.poll_interval_secs.max(1))
    }

    /// Checks both signals once and searches if either moved
    ///
    /// Observed state only advances after the results store was written, so
    /// a failed write is retried on the next poll.
    pub fn poll(&mut self) -> StorageResult<Option<PollOutcome>> {
        let current = KeywordSet::load(&self.keywords_path);

        let removed = current.removed_since(&self.keywords);
        if !removed.is_empty() {
            tracing::info!("Keywords removed: {}", removed.join(", "));
        }

        if let Some(marker) = self.marker.read().filter(|m| self.marker_watch.is_changed(m)) {
            tracing::info!("Run-complete marker advanced to {}", marker.to_rfc3339());
            let outcome = if current.is_empty() {
                None
            } else {
                Some(self.run_search(current.as_slice(), &current, Trigger::RunComplete)?)
            };
            self.marker_watch.commit(marker);
            self.keywords = current;
            return Ok(outcome);
        }

        let added = current.added_since(&self.keywords);
        if added.is_empty() {
            self.keywords = current;
            return Ok(None);
        }

        tracing::info!("New keywords: {}", added.join(", "));
        let outcome = self.run_search(&added, &current, Trigger::Keywords)?;
        self.keywords = current;
        Ok(Some(outcome))
    }

    /// Searches every current keyword regardless of signals
    pub fn scan_all(&mut self, trigger: Trigger) -> StorageResult<PollOutcome> {
        let current = KeywordSet::load(&self.keywords_path);
        if current.is_empty() {
            tracing::warn!(
                "No keywords in {}; nothing to search",
                self.keywords_path.display()
            );
        }
        let outcome = self.run_search(current.as_slice(), &current, trigger)?;
        self.keywords = current;
        Ok(outcome)
    }

    /// Polls until shutdown; errors are logged and never end the loop
    pub async fn watch(&mut self, shutdown: &Shutdown) {
        tracing::info!(
            "Watching {} and {} every {:?}",
            self.keywords_path.display(),
            self.marker.path().display(),
            self.poll_interval()
        );

        loop {
            if shutdown.is_requested() {
                break;
            }
            if let Err(e) = self.poll() {
                tracing::error!("Keyword poll failed: {}", e);
            }
            if !shutdown.sleep(self.poll_interval()).await {
                break;
            }
        }
        tracing::info!("Keyword watch stopped");
    }

    fn run_search(
        &self,
        keywords: &[String],
        current: &KeywordSet,
        trigger: Trigger,
    ) -> StorageResult<PollOutcome> {
        let now = Utc::now();
        let corpus = enumerate(&self.storage);
        let ledger = DeadLedger::load(&self.ledger_path);
        let results = search(keywords, &corpus, &ledger, SnippetOptions::from(&self.options), now);
        let hits = results.values().map(Vec::len).sum();

        let mut store = ResultsStore::load(&self.results_path);
        store.merge(Merge {
            results,
            trigger,
            at: now,
            history_limit: self.options.history_limit,
            keep_only: self
                .options
                .prune_removed_keywords
                .then(|| current.as_slice()),
        });
        store.save(&self.results_path)?;

        tracing::info!(
            "Searched {} keyword(s) over {} file(s) ({}): {} hit(s)",
            keywords.len(),
            corpus.len(),
            trigger,
            hits
        );

        Ok(PollOutcome {
            trigger,
            searched: keywords.to_vec(),
            files_scanned: corpus.len(),
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> WatchEngine {
        let paths = PathsConfig {
            source_dir: dir.path().join("Source"),
            keywords_file: dir.path().join("keywords.txt"),
            results_file: dir.path().join("results.json"),
            ledger_file: None,
            marker_file: None,
        };
        WatchEngine::new(&paths, ScoopConfig::default())
    }

    #[test]
    fn test_missing_inputs_do_nothing() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        assert_eq!(engine.poll().unwrap(), None);
        assert!(!dir.path().join("results.json").exists());
    }

    #[test]
    fn test_first_poll_searches_all_then_idles() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("keywords.txt"), "alpha\nbeta\n").unwrap();
        let mut engine = engine(&dir);

        let outcome = engine.poll().unwrap().unwrap();
        assert_eq!(outcome.trigger, Trigger::Keywords);
        assert_eq!(outcome.searched, vec!["alpha", "beta"]);
        assert_eq!(engine.poll().unwrap(), None);
    }

    #[test]
    fn test_marker_advance_without_keywords_is_committed() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        RunMarker::new(dir.path().join("Source/run_complete"))
            .write(Utc::now())
            .unwrap();

        assert_eq!(engine.poll().unwrap(), None);
        std::fs::write(dir.path().join("keywords.txt"), "alpha\n").unwrap();
        let outcome = engine.poll().unwrap().unwrap();
        assert_eq!(outcome.trigger, Trigger::Keywords);
    }

    #[test]
    fn test_prune_removed_keywords() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("keywords.txt"), "alpha\nbeta\n").unwrap();
        let mut engine = engine(&dir);
        engine.options.prune_removed_keywords = true;
        engine.poll().unwrap();

        std::fs::write(dir.path().join("keywords.txt"), "beta\ngamma\n").unwrap();
        engine.poll().unwrap();

        let store = ResultsStore::load(&dir.path().join("results.json"));
        let keys: Vec<_> = store.keywords.keys().cloned().collect();
        assert_eq!(keys, vec!["beta", "gamma"]);
    }
}
