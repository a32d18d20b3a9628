//! Crawler coordinator - per-site crawl logic
//!
//! This module contains the breadth-first loop that crawls one site:
//! - Skipping sites the dead ledger still excludes
//! - Managing the frontier queue and page budget
//! - Coordinating fetching, snapshot storage and link extraction
//! - Tallying failures and marking exhausted sites dead

use crate::config::SiteConfig;
use crate::crawler::fetcher::{FetchedPage, Fetcher};
use crate::crawler::frontier::{Frontier, QueuedUrl};
use crate::crawler::parser::parse_html;
use crate::shutdown::Shutdown;
use crate::state::{DeadLedger, FailureKind, FailureTally};
use crate::storage::{SiteMetadata, Storage};
use crate::url::{has_skipped_extension, is_same_site, normalize_url};
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a site's crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteOutcome {
    /// Frontier exhausted or page budget used up
    Completed,
    /// The ledger still excludes the site
    SkippedDead,
    /// Too many consecutive failures; the site is now in the ledger
    MarkedDead { reason: String },
    /// A shutdown was requested mid-site
    Interrupted,
}

impl fmt::Display for SiteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::SkippedDead => write!(f, "skipped (dead)"),
            Self::MarkedDead { .. } => write!(f, "marked dead"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Per-site summary returned after each crawl
#[derive(Debug, Clone)]
pub struct SiteReport {
    pub site: String,
    /// Fetch attempts charged against the page budget
    pub pages_fetched: usize,
    pub snapshots_written: usize,
    pub network_failures: u32,
    pub archived_pages: u32,
    pub storage_errors: usize,
    pub outcome: SiteOutcome,
    pub elapsed: Duration,
}

impl SiteReport {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            pages_fetched: 0,
            snapshots_written: 0,
            network_failures: 0,
            archived_pages: 0,
            storage_errors: 0,
            outcome: SiteOutcome::Completed,
            elapsed: Duration::ZERO,
        }
    }
}

/// Mutable state of one site's crawl
struct SiteRun<'a> {
    site: &'a SiteConfig,
    frontier: Frontier,
    metadata: SiteMetadata,
    tally: FailureTally,
    report: SiteReport,
}

/// Crawls sites one at a time against shared storage and ledger
pub struct Coordinator {
    fetcher: Fetcher,
    storage: Arc<dyn Storage>,
    ledger: DeadLedger,
    shutdown: Shutdown,
}

impl Coordinator {
    pub fn new(
        fetcher: Fetcher,
        storage: Arc<dyn Storage>,
        ledger: DeadLedger,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            fetcher,
            storage,
            ledger,
            shutdown,
        }
    }

    pub fn ledger(&self) -> &DeadLedger {
        &self.ledger
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Crawls one site breadth-first
    ///
    /// Never fails as a whole: fetch and storage problems are logged,
    /// recorded on page records, and reflected in the returned report.
    pub async fn crawl_site(&mut self, site: &SiteConfig) -> SiteReport {
        let started = Instant::now();

        if self.ledger.is_dead(&site.key) {
            let until = self
                .ledger
                .get(&site.key)
                .map(|e| e.until.to_rfc3339())
                .unwrap_or_default();
            tracing::info!("Skipping dead site {} (until {})", site.key, until);
            let mut report = SiteReport::new(&site.key);
            report.outcome = SiteOutcome::SkippedDead;
            return report;
        }

        tracing::info!(
            "Crawling {} from {} seed(s), max {} pages, max depth {}",
            site.key,
            site.seeds.len(),
            site.max_pages,
            site.max_depth
        );

        let mut run = SiteRun {
            site,
            frontier: Frontier::with_seeds(&site.seeds),
            metadata: self.storage.load_metadata(&site.key),
            tally: FailureTally::new(),
            report: SiteReport::new(&site.key),
        };

        while run.report.pages_fetched < site.max_pages {
            if self.shutdown.is_requested() {
                run.report.outcome = SiteOutcome::Interrupted;
                break;
            }

            let Some(queued) = run.frontier.pop() else {
                break;
            };
            if run.frontier.is_visited(&queued.url) {
                continue;
            }
            if has_skipped_extension(&queued.url) {
                tracing::debug!("Skipping non-page URL {}", queued.url);
                continue;
            }
            run.frontier.mark_visited(&queued.url);

            if !self.shutdown.sleep(politeness_delay(site.polite)).await {
                run.report.outcome = SiteOutcome::Interrupted;
                break;
            }

            run.report.pages_fetched += 1;
            tracing::debug!("Fetching {} (depth {})", queued.url, queued.depth);

            let stop = match self.fetcher.fetch(&queued.url).await {
                Err(e) => {
                    tracing::warn!("Fetch failed for {}: {}", queued.url, e);
                    let page_key = queued.url.as_str();
                    run.metadata.page_mut(page_key).last_error = Some(e.to_string());
                    self.persist_metadata(&mut run);
                    run.report.network_failures += 1;
                    self.record_failure(&mut run, FailureKind::Network, e.to_string())
                }
                Ok(page) if page.is_archived() => {
                    self.record_archived(&mut run, &queued, &page);
                    run.report.archived_pages += 1;
                    self.record_failure(
                        &mut run,
                        FailureKind::Archived,
                        format!("HTTP {} at {}", page.status, queued.url),
                    )
                }
                Ok(page) => {
                    run.tally.reset();
                    self.record_snapshot(&mut run, &queued, &page);
                    if queued.depth < site.max_depth && page.is_markup() {
                        enqueue_links(&mut run, &queued, &page);
                    }
                    false
                }
            };

            if stop {
                break;
            }
        }

        if !run.frontier.is_empty() {
            tracing::debug!(
                "{}: {} URL(s) left queued after visiting {}",
                site.key,
                run.frontier.len(),
                run.frontier.visited_count()
            );
        }

        let mut report = run.report;
        report.elapsed = started.elapsed();
        tracing::info!(
            "Finished {}: {} ({} pages, {} snapshots, {} network failures, {} archived) in {:.1}s",
            report.site,
            report.outcome,
            report.pages_fetched,
            report.snapshots_written,
            report.network_failures,
            report.archived_pages,
            report.elapsed.as_secs_f64()
        );
        report
    }

    /// Feeds the failure streak; returns true once the site has been marked dead
    fn record_failure(&mut self, run: &mut SiteRun<'_>, kind: FailureKind, detail: String) -> bool {
        let streak = run.tally.record(kind, detail);
        if streak < run.site.max_failures {
            return false;
        }

        let reason = run.tally.reason();
        if let Err(e) = self.ledger.mark_dead(&run.site.key, &reason, run.site.retry_after) {
            tracing::error!("Failed to persist dead ledger: {}", e);
        }
        run.report.outcome = SiteOutcome::MarkedDead { reason };
        true
    }

    /// Freezes a page's history after an archive status
    fn record_archived(&self, run: &mut SiteRun<'_>, queued: &QueuedUrl, page: &FetchedPage) {
        tracing::info!("{} answered HTTP {}; archiving page", queued.url, page.status);
        let record = run.metadata.page_mut(queued.url.as_str());
        record.archived = true;
        record.status_code = Some(page.status);
        record.last_seen_at = Some(Utc::now());
        record.last_error = None;
        self.persist_metadata(run);
    }

    /// Stores a new snapshot and prunes old ones
    fn record_snapshot(&self, run: &mut SiteRun<'_>, queued: &QueuedUrl, page: &FetchedPage) {
        let site = run.site;
        let content_hash = hex::encode(Sha256::digest(&page.body));
        let written = self.storage.write_snapshot(&site.key, &queued.url, &page.body);

        let record = run.metadata.page_mut(queued.url.as_str());
        if record.content_hash.as_deref() == Some(content_hash.as_str()) {
            tracing::debug!("Content of {} unchanged since last fetch", queued.url);
        }

        let mut evicted = Vec::new();
        match written {
            Ok(snapshot_id) => {
                record.push_snapshot(snapshot_id);
                // Uses the flag from before this fetch: a page coming back
                // from the archive keeps its history this once
                evicted = record.prune(site.max_versions_per_page);
                record.last_error = None;
                run.report.snapshots_written += 1;
            }
            Err(e) => {
                tracing::error!("Failed to store snapshot of {}: {}", queued.url, e);
                record.last_error = Some(format!("storage: {}", e));
                run.report.storage_errors += 1;
            }
        }

        record.archived = false;
        record.content_hash = Some(content_hash);
        record.status_code = Some(page.status);
        record.content_type = page.content_type();
        record.last_seen_at = Some(Utc::now());

        for snapshot_id in &evicted {
            if let Err(e) = self.storage.delete_snapshot(&site.key, snapshot_id) {
                tracing::error!("Failed to delete pruned snapshot {}: {}", snapshot_id, e);
                run.report.storage_errors += 1;
            }
        }
        if !evicted.is_empty() {
            tracing::debug!("Pruned {} old snapshot(s) of {}", evicted.len(), queued.url);
        }

        self.persist_metadata(run);
    }

    fn persist_metadata(&self, run: &mut SiteRun<'_>) {
        if let Err(e) = self.storage.save_metadata(&run.site.key, &run.metadata) {
            tracing::error!("Failed to save metadata for {}: {}", run.site.key, e);
            run.report.storage_errors += 1;
        }
    }
}

/// Queues a page's same-site links one level deeper
fn enqueue_links(run: &mut SiteRun<'_>, queued: &QueuedUrl, page: &FetchedPage) {
    let parsed = parse_html(&page.text(), &page.url);
    if let Some(title) = &parsed.title {
        tracing::debug!("{}: {}", queued.url, title);
    }

    let mut added = 0;
    for link in parsed.links {
        let Ok(link) = normalize_url(link.as_str()) else {
            continue;
        };
        if !is_same_site(&run.site.base_url, &link) || run.frontier.is_visited(&link) {
            continue;
        }
        if run.frontier.push(link, queued.depth + 1) {
            added += 1;
        }
    }
    tracing::debug!("Queued {} new link(s) from {}", added, queued.url);
}

/// Delay drawn uniformly from the site's politeness range
fn politeness_delay((min, max): (f64, f64)) -> Duration {
    let secs = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    Duration::from_secs_f64(secs.max(0.0))
}
