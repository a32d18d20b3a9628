//! Crawler module for versioned site snapshots
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching through an optional SOCKS proxy with retry logic
//! - HTML parsing and link extraction
//! - The per-site breadth-first crawl and failure tally
//! - Cycle scheduling, identity rotation and the run-complete marker

mod backoff;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;

pub use backoff::ExponentialBackoff;
pub use coordinator::{Coordinator, SiteOutcome, SiteReport};
pub use fetcher::{
    build_http_client, FetchError, FetchedPage, Fetcher, Transport, ARCHIVE_STATUSES,
    DEFAULT_PROXY, PROXY_ENV,
};
pub use frontier::{Frontier, QueuedUrl};
pub use parser::{extract_text, parse_html, resolve_link, ParsedPage};
pub use scheduler::{CycleReport, CycleScheduler};

use crate::config::{Config, SiteSet};
use crate::control::select_rotator;
use crate::shutdown::Shutdown;
use crate::state::{DeadLedger, RunMarker};
use crate::storage::open_storage;
use crate::ScoopError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Builds a scheduler from configuration
///
/// Detects the transport, opens storage and the ledger, and selects the
/// identity rotator. A positive `schedule.interval-minutes` makes the
/// scheduler loop; otherwise it runs one cycle.
pub async fn build_scheduler(
    config: &Config,
    sites: SiteSet,
    shutdown: Shutdown,
) -> Result<CycleScheduler, ScoopError> {
    let fetcher = Fetcher::connect(&config.fetch).await?;
    let storage = Arc::new(open_storage(&config.paths.source_dir));
    let ledger = DeadLedger::load(config.paths.ledger_path());
    let coordinator = Coordinator::new(fetcher, storage, ledger, shutdown);

    let interval = (config.schedule.interval_minutes > 0.0)
        .then(|| Duration::from_secs_f64(config.schedule.interval_minutes * 60.0));

    Ok(CycleScheduler::new(
        coordinator,
        sites,
        RunMarker::new(config.paths.marker_path()),
        select_rotator(&config.schedule, &config.control),
        interval,
    ))
}

/// Runs the crawler as configured
///
/// When `config_path` is given the site list is re-read before every cycle.
pub async fn crawl(
    config: &Config,
    config_path: Option<&Path>,
    shutdown: Shutdown,
) -> Result<CycleReport, ScoopError> {
    let sites = crate::config::normalize_sites(&config.sites);
    for skipped in &sites.skipped {
        tracing::warn!("Skipping site entry #{}: {}", skipped.index, skipped.reason);
    }

    let mut scheduler = build_scheduler(config, sites, shutdown).await?;
    if let Some(path) = config_path {
        scheduler = scheduler.with_config_reload(path);
    }
    Ok(scheduler.run().await)
}
