//! Integration tests for the keyword watch engine
//!
//! These tests build a small snapshot tree on disk, then drive the engine
//! through keyword edits and run-complete marker advances.

use chrono::{Duration, Utc};
use paritybit::config::{PathsConfig, ScoopConfig};
use paritybit::scoop::{ResultsStore, Trigger, WatchEngine};
use paritybit::state::{DeadLedger, RunMarker};
use paritybit::storage::{FileStorage, Storage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

struct Fixture {
    dir: TempDir,
    paths: PathsConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig {
            source_dir: dir.path().join("Source"),
            keywords_file: dir.path().join("keywords.txt"),
            results_file: dir.path().join("results.json"),
            ledger_file: None,
            marker_file: None,
        };
        Self { dir, paths }
    }

    fn storage(&self) -> FileStorage {
        FileStorage::new(&self.paths.source_dir)
    }

    fn add_page(&self, site: &str, url: &str, html: &str, archived: bool) {
        let storage = self.storage();
        let url = Url::parse(url).unwrap();
        let id = storage.write_snapshot(site, &url, html.as_bytes()).unwrap();
        let mut metadata = storage.load_metadata(site);
        let record = metadata.page_mut(url.as_str());
        record.push_snapshot(id);
        record.archived = archived;
        storage.save_metadata(site, &metadata).unwrap();
    }

    fn write_keywords(&self, content: &str) {
        std::fs::write(&self.paths.keywords_file, content).unwrap();
    }

    fn advance_marker(&self, minutes: i64) {
        RunMarker::new(self.paths.marker_path())
            .write(Utc::now() + Duration::minutes(minutes))
            .unwrap();
    }

    fn results(&self) -> ResultsStore {
        ResultsStore::load(&self.paths.results_file)
    }

    fn engine(&self) -> WatchEngine {
        WatchEngine::new(&self.paths, ScoopConfig::default())
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn entry_json(store: &ResultsStore, keyword: &str) -> String {
    serde_json::to_string_pretty(&store.keywords[keyword]).unwrap()
}

#[test]
fn test_added_keyword_searches_only_that_keyword() {
    let fx = Fixture::new();
    fx.add_page("market", "http://market.onion/", "<p>Alpha goods and beta goods</p>", false);
    fx.write_keywords("alpha\n");

    let mut engine = fx.engine();
    let first = engine.poll().unwrap().expect("initial search");
    assert_eq!(first.searched, vec!["alpha"]);
    let alpha_before = entry_json(&fx.results(), "alpha");

    fx.write_keywords("alpha\nbeta\n");
    let second = engine.poll().unwrap().expect("incremental search");
    assert_eq!(second.trigger, Trigger::Keywords);
    assert_eq!(second.searched, vec!["beta"]);

    let store = fx.results();
    assert_eq!(entry_json(&store, "alpha"), alpha_before);
    assert_eq!(store.keywords["beta"].hits.len(), 1);
    assert_eq!(store.keywords["beta"].hits[0].snippets[0], "alpha goods and BETA goods");
    assert_eq!(store.history[0].updated_keywords, vec!["beta"]);

    assert!(engine.poll().unwrap().is_none());
}

#[test]
fn test_marker_advance_searches_everything() {
    let fx = Fixture::new();
    fx.add_page("market", "http://market.onion/", "<p>nothing yet</p>", false);
    fx.write_keywords("alpha\nbeta\n");

    let mut engine = fx.engine();
    engine.poll().unwrap();
    assert!(fx.results().keywords["alpha"].hits.is_empty());

    fx.add_page("market", "http://market.onion/new", "<p>alpha arrived</p>", false);
    assert!(engine.poll().unwrap().is_none());

    fx.advance_marker(1);
    let outcome = engine.poll().unwrap().expect("full search");
    assert_eq!(outcome.trigger, Trigger::RunComplete);
    assert_eq!(outcome.searched, vec!["alpha", "beta"]);

    let store = fx.results();
    assert_eq!(store.keywords["alpha"].hits.len(), 1);
    assert_eq!(store.history[0].trigger, Trigger::RunComplete);
    assert_eq!(store.history[0].updated_keywords, vec!["alpha", "beta"]);

    assert!(engine.poll().unwrap().is_none());
}

#[test]
fn test_hits_carry_archive_dead_and_orphan_state() {
    let fx = Fixture::new();
    fx.add_page("gone", "http://gone.onion/", "<p>needle here</p>", true);
    fx.add_page("live", "http://live.onion/", "<p>another needle</p>", false);

    let orphan: PathBuf = fx.storage().snapshot_path("live", "orphan.html");
    std::fs::write(&orphan, "<p>orphan needle</p>").unwrap();

    let mut ledger = DeadLedger::load(fx.paths.ledger_path());
    ledger
        .mark_dead("gone.onion", "unreachable", Duration::hours(1))
        .unwrap();

    fx.write_keywords("NEEDLE\n");
    fx.engine().scan_all(Trigger::Manual).unwrap();

    let store = fx.results();
    let hits = &store.keywords["NEEDLE"].hits;
    assert_eq!(hits.len(), 3);

    let gone = hits.iter().find(|h| h.site == "gone").unwrap();
    assert!(gone.archived);
    assert!(gone.dead);

    let orphan_hit = hits.iter().find(|h| h.url.is_none()).unwrap();
    assert_eq!(orphan_hit.site, "live");
    assert!(!orphan_hit.dead);
    assert_eq!(store.history[0].trigger, Trigger::Manual);
    assert!(fx.path().join("results.json").exists());
}

#[test]
fn test_corrupt_results_file_is_replaced() {
    let fx = Fixture::new();
    fx.add_page("market", "http://market.onion/", "<p>alpha</p>", false);
    fx.write_keywords("alpha\n");
    std::fs::write(&fx.paths.results_file, "{ not json").unwrap();

    let mut engine = fx.engine();
    engine.poll().unwrap();
    assert_eq!(fx.results().keywords["alpha"].hits.len(), 1);
}
