//! Cycle scheduler
//!
//! Runs every enabled site once per cycle, in config order, then persists the
//! ledger and advances the run-complete marker. Between cycles it sleeps the
//! configured interval; a shutdown request ends the loop at the next page
//! boundary.

use crate::config::{load_config, normalize_sites, SiteSet};
use crate::control::IdentityRotator;
use crate::crawler::coordinator::{Coordinator, SiteOutcome, SiteReport};
use crate::state::RunMarker;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Summary of one crawl cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: Vec<SiteReport>,
    /// Cut short by a shutdown request; the marker was not advanced
    pub interrupted: bool,
}

impl CycleReport {
    pub fn pages_fetched(&self) -> usize {
        self.sites.iter().map(|s| s.pages_fetched).sum()
    }

    pub fn sites_marked_dead(&self) -> usize {
        self.sites
            .iter()
            .filter(|s| matches!(s.outcome, SiteOutcome::MarkedDead { .. }))
            .count()
    }

    pub fn sites_skipped(&self) -> usize {
        self.sites
            .iter()
            .filter(|s| s.outcome == SiteOutcome::SkippedDead)
            .count()
    }
}

/// Drives crawl cycles
pub struct CycleScheduler {
    coordinator: Coordinator,
    sites: SiteSet,
    marker: RunMarker,
    rotator: Arc<dyn IdentityRotator>,
    interval: Option<Duration>,
    config_path: Option<PathBuf>,
}

impl CycleScheduler {
    /// Creates a scheduler; `interval` of `None` runs a single cycle
    pub fn new(
        coordinator: Coordinator,
        sites: SiteSet,
        marker: RunMarker,
        rotator: Arc<dyn IdentityRotator>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            coordinator,
            sites,
            marker,
            rotator,
            interval,
            config_path: None,
        }
    }

    /// Re-reads the site list from `path` before every cycle
    pub fn with_config_reload(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Runs cycles until done or interrupted; returns the last cycle's report
    pub async fn run(&mut self) -> CycleReport {
        let mut cycle = 0u64;

        loop {
            cycle += 1;
            tracing::info!("Starting crawl cycle {}", cycle);
            let report = self.run_cycle().await;

            let Some(interval) = self.interval else {
                return report;
            };
            if report.interrupted {
                return report;
            }

            tracing::info!("Next cycle in {:.1} minutes", interval.as_secs_f64() / 60.0);
            if !self.coordinator.shutdown().sleep(interval).await {
                tracing::info!("Shutdown requested during cycle interval");
                return report;
            }
        }
    }

    /// Runs one cycle over all enabled sites
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();
        self.reload_sites();

        if let Err(e) = self.rotator.rotate().await {
            tracing::warn!("Identity rotation via {} failed: {}", self.rotator.name(), e);
        }

        let mut sites = Vec::new();
        let mut interrupted = false;
        for site in self.sites.enabled() {
            if self.coordinator.shutdown().is_requested() {
                interrupted = true;
                break;
            }
            let report = self.coordinator.crawl_site(site).await;
            let stop = report.outcome == SiteOutcome::Interrupted;
            sites.push(report);
            if stop {
                interrupted = true;
                break;
            }
        }

        if let Err(e) = self.coordinator.ledger().save() {
            tracing::error!("Failed to save dead ledger: {}", e);
        }

        let finished_at = Utc::now();
        if interrupted {
            tracing::warn!("Cycle interrupted; run-complete marker left unchanged");
        } else if let Err(e) = self.marker.write(finished_at) {
            tracing::error!("Failed to write run-complete marker: {}", e);
        }

        let report = CycleReport {
            started_at,
            finished_at,
            sites,
            interrupted,
        };
        tracing::info!(
            "Cycle finished: {} site(s), {} pages, {} skipped dead, {} newly dead",
            report.sites.len(),
            report.pages_fetched(),
            report.sites_skipped(),
            report.sites_marked_dead()
        );
        report
    }

    /// Picks up site list edits; keeps the previous list if the file is broken
    fn reload_sites(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        match load_config(path) {
            Ok(config) => {
                let sites = normalize_sites(&config.sites);
                for skipped in &sites.skipped {
                    tracing::warn!("Skipping site entry #{}: {}", skipped.index, skipped.reason);
                }
                self.sites = sites;
            }
            Err(e) => {
                tracing::warn!(
                    "Could not reload {}: {}; keeping previous site list",
                    path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize_site, FetchConfig, SiteEntry, SiteTable};
    use crate::control::{ControlError, NoopRotator};
    use crate::crawler::fetcher::{Fetcher, Transport};
    use crate::shutdown::Shutdown;
    use crate::state::DeadLedger;
    use crate::storage::FileStorage;
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingRotator(AtomicUsize);

    impl IdentityRotator for FailingRotator {
        fn rotate(&self) -> BoxFuture<'_, Result<(), ControlError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(ControlError::Timeout("127.0.0.1:9051".to_string())) })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn scheduler(dir: &TempDir, server: &MockServer, rotator: Arc<dyn IdentityRotator>) -> CycleScheduler {
        let fetcher = Fetcher::with_transport(&FetchConfig::default(), Transport::Direct).unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()));
        let ledger = DeadLedger::load(dir.path().join("dead_sites.json"));
        let coordinator = Coordinator::new(fetcher, storage, ledger, Shutdown::never());

        let entry = SiteEntry::Table(SiteTable {
            url: Some(server.uri()),
            polite: Some(vec![0.0]),
            ..SiteTable::default()
        });
        let sites = SiteSet {
            sites: vec![normalize_site(0, &entry).unwrap()],
            skipped: Vec::new(),
        };
        let marker = RunMarker::new(dir.path().join("run_complete"));
        CycleScheduler::new(coordinator, sites, marker, rotator, None)
    }

    #[tokio::test]
    async fn test_cycle_writes_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let mut scheduler = scheduler(&dir, &server, Arc::new(NoopRotator));

        let report = scheduler.run().await;
        assert!(!report.interrupted);
        assert_eq!(report.pages_fetched(), 1);

        let marker = RunMarker::new(dir.path().join("run_complete")).read().unwrap();
        assert!(marker >= report.started_at);
    }

    #[tokio::test]
    async fn test_rotation_failure_does_not_block_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let rotator = Arc::new(FailingRotator(AtomicUsize::new(0)));
        let mut scheduler = scheduler(&dir, &server, rotator.clone());

        let report = scheduler.run_cycle().await;
        assert_eq!(rotator.0.load(Ordering::SeqCst), 1);
        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.sites[0].outcome, SiteOutcome::Completed);
    }

    #[tokio::test]
    async fn test_broken_reload_keeps_sites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("paritybit.toml");
        std::fs::write(&config_path, "this is [not toml").unwrap();

        let mut scheduler =
            scheduler(&dir, &server, Arc::new(NoopRotator)).with_config_reload(&config_path);
        let report = scheduler.run_cycle().await;
        assert_eq!(report.sites.len(), 1);
    }
}
