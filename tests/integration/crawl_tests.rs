//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run whole
//! site crawls and cycles end-to-end against a temporary source tree.

use paritybit::config::{normalize_site, FetchConfig, SiteConfig, SiteEntry, SiteSet, SiteTable};
use paritybit::control::NoopRotator;
use paritybit::crawler::{Coordinator, CycleScheduler, Fetcher, SiteOutcome, Transport};
use paritybit::shutdown::Shutdown;
use paritybit::state::{DeadLedger, RunMarker};
use paritybit::storage::{FileStorage, Storage};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "hidden";

fn site_config(server: &MockServer, table: SiteTable) -> SiteConfig {
    let entry = SiteEntry::Table(SiteTable {
        name: Some(SITE.to_string()),
        url: Some(format!("{}/", server.uri())),
        polite: Some(vec![0.0]),
        ..table
    });
    normalize_site(0, &entry).expect("valid site entry")
}

fn fetch_config() -> FetchConfig {
    FetchConfig {
        max_attempts: 1,
        backoff_base_ms: 1,
        total_timeout_secs: 5,
        direct: true,
        ..FetchConfig::default()
    }
}

fn coordinator(dir: &TempDir) -> Coordinator {
    let fetcher = Fetcher::with_transport(&fetch_config(), Transport::Direct).unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()));
    let ledger = DeadLedger::load(dir.path().join("dead_sites.json"));
    Coordinator::new(fetcher, storage, ledger, Shutdown::never())
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

#[tokio::test]
async fn test_depth_limit_stops_enqueueing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/depth1">one</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/depth1"))
        .respond_with(html(r#"<a href="/depth2">two</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/depth2"))
        .respond_with(html("too deep"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let site = site_config(
        &server,
        SiteTable {
            max_depth: Some(1),
            ..SiteTable::default()
        },
    );

    let report = coordinator(&dir).crawl_site(&site).await;
    assert_eq!(report.outcome, SiteOutcome::Completed);
    assert_eq!(report.pages_fetched, 2);

    let metadata = FileStorage::new(dir.path()).load_metadata(SITE);
    let urls: Vec<_> = metadata.pages.keys().cloned().collect();
    assert_eq!(
        urls,
        vec![format!("{}/", server.uri()), format!("{}/depth1", server.uri())]
    );
}

#[tokio::test]
async fn test_page_budget_counts_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html("leaf"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let site = site_config(
        &server,
        SiteTable {
            max_pages: Some(2),
            ..SiteTable::default()
        },
    );

    let report = coordinator(&dir).crawl_site(&site).await;
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(FileStorage::new(dir.path()).load_metadata(SITE).pages.len(), 2);
}

#[tokio::test]
async fn test_version_history_and_archive_freeze() {
    let server = MockServer::start().await;
    // Responses in order: 200, 200, 404, 200, 200
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("v1"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("v2"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    let site = site_config(
        &server,
        SiteTable {
            max_depth: Some(0),
            max_versions_per_page: Some(2),
            ..SiteTable::default()
        },
    );
    let page_url = format!("{}/", server.uri());
    let mut coordinator = coordinator(&dir);

    coordinator.crawl_site(&site).await;
    coordinator.crawl_site(&site).await;
    let two = storage.load_metadata(SITE).pages[&page_url].files.clone();
    assert_eq!(two.len(), 2);

    let report = coordinator.crawl_site(&site).await;
    assert_eq!(report.archived_pages, 1);
    let record = storage.load_metadata(SITE).pages[&page_url].clone();
    assert!(record.archived);
    assert_eq!(record.status_code, Some(404));
    assert_eq!(record.files, two);

    // Back from the archive: keeps its whole history this once
    coordinator.crawl_site(&site).await;
    let record = storage.load_metadata(SITE).pages[&page_url].clone();
    assert!(!record.archived);
    assert_eq!(record.files.len(), 3);
    assert_eq!(&record.files[1..], &two[..]);

    // Then normal pruning resumes and evicted files leave the disk
    coordinator.crawl_site(&site).await;
    let record = storage.load_metadata(SITE).pages[&page_url].clone();
    assert_eq!(record.files.len(), 2);
    let mut on_disk = storage.list_snapshots(SITE);
    on_disk.sort();
    let mut listed = record.files.clone();
    listed.sort();
    assert_eq!(on_disk, listed);
}

#[tokio::test]
async fn test_dead_site_skipped_next_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a><a href="/b">b</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let site = site_config(
        &server,
        SiteTable {
            max_failures: Some(2),
            ..SiteTable::default()
        },
    );
    let sites = SiteSet {
        sites: vec![site],
        skipped: Vec::new(),
    };
    let marker = RunMarker::new(dir.path().join("run_complete"));
    let mut scheduler = CycleScheduler::new(
        coordinator(&dir),
        sites,
        marker.clone(),
        Arc::new(NoopRotator),
        None,
    );

    let first = scheduler.run_cycle().await;
    match &first.sites[0].outcome {
        SiteOutcome::MarkedDead { reason } => assert!(reason.contains("2 network")),
        other => panic!("expected site to be marked dead, got {:?}", other),
    }
    let first_marker = marker.read().expect("marker written");

    let persisted = DeadLedger::load(dir.path().join("dead_sites.json"));
    assert!(persisted.get(SITE).is_some());

    let second = scheduler.run_cycle().await;
    assert_eq!(second.sites[0].outcome, SiteOutcome::SkippedDead);
    assert_eq!(second.sites[0].pages_fetched, 0);
    assert!(marker.read().expect("marker written") >= first_marker);
}

#[tokio::test]
async fn test_expired_dead_entry_is_revived_and_pruned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("alive again"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("dead_sites.json");
    std::fs::write(
        &ledger_path,
        format!(
            r#"{{"{}": {{"marked_at": "2020-01-01T00:00:00Z", "until": "2020-01-02T00:00:00Z", "reason": "old"}}}}"#,
            SITE
        ),
    )
    .unwrap();

    let site = site_config(
        &server,
        SiteTable {
            max_depth: Some(0),
            ..SiteTable::default()
        },
    );
    let report = coordinator(&dir).crawl_site(&site).await;
    assert_eq!(report.outcome, SiteOutcome::Completed);
    assert_eq!(report.pages_fetched, 1);

    let persisted = DeadLedger::load(&ledger_path);
    assert!(persisted.get(SITE).is_none());
}

#[tokio::test]
async fn test_storage_failure_does_not_stop_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/next">next</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("next"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    // A file where the snapshot directory should be makes snapshot writes fail
    std::fs::create_dir_all(dir.path().join(SITE)).unwrap();
    std::fs::write(dir.path().join(SITE).join("html"), b"not a directory").unwrap();

    let site = site_config(&server, SiteTable::default());
    let report = coordinator(&dir).crawl_site(&site).await;
    assert_eq!(report.outcome, SiteOutcome::Completed);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.snapshots_written, 0);
    assert!(report.storage_errors >= 2);

    let metadata = FileStorage::new(dir.path()).load_metadata(SITE);
    let record = &metadata.pages[&format!("{}/", server.uri())];
    assert!(record.files.is_empty());
    assert!(record.last_error.as_deref().unwrap_or("").starts_with("storage:"));
}
