//! Paritybit main entry point
//!
//! This is the command-line interface for the Paritybit crawler and keyword
//! scooper. The two engines are independent subcommands that share only the
//! files named in the configuration.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use paritybit::config::{load_config_with_hash, normalize_sites, Config};
use paritybit::crawler::crawl;
use paritybit::scoop::{ResultsStore, Trigger, WatchEngine};
use paritybit::shutdown::install_ctrl_c_handler;
use paritybit::DeadLedger;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Paritybit: a versioning crawler and keyword scooper
///
/// The crawler keeps a bounded history of snapshots for every page of the
/// configured sites, marking sites dead after repeated failures. The scooper
/// searches those snapshots for watched keywords.
#[derive(Parser, Debug)]
#[command(name = "paritybit")]
#[command(version = "1.0.0")]
#[command(about = "A versioning crawler and keyword scooper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "paritybit.toml", global = true)]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the configured sites once or on an interval
    Crawl {
        /// Run a single cycle and exit
        #[arg(long, conflicts_with = "interval_minutes")]
        once: bool,

        /// Minutes between cycles (overrides [schedule])
        #[arg(long, value_name = "MINUTES")]
        interval_minutes: Option<f64>,

        /// Request a new proxy identity before each cycle
        #[arg(long)]
        rotate_identity: bool,
    },

    /// Search the snapshots for watched keywords
    Scoop {
        /// Keep polling for keyword and crawl changes
        #[arg(long)]
        watch: bool,

        /// Seconds between polls (overrides [scoop])
        #[arg(long, value_name = "SECONDS", requires = "watch")]
        poll_interval: Option<u64>,
    },

    /// Validate config and show what would be crawled without crawling
    Check,

    /// Summarize the results store
    Status {
        /// History entries to show
        #[arg(long, default_value_t = 10)]
        history: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Crawl {
            once,
            interval_minutes,
            rotate_identity,
        } => {
            if once {
                config.schedule.interval_minutes = 0.0;
            }
            if let Some(minutes) = interval_minutes {
                anyhow::ensure!(
                    minutes.is_finite() && minutes >= 0.0,
                    "--interval-minutes must be >= 0"
                );
                config.schedule.interval_minutes = minutes;
            }
            if rotate_identity {
                config.schedule.rotate_identity = true;
            }
            handle_crawl(&config, cli.config).await
        }
        Command::Scoop {
            watch,
            poll_interval,
        } => {
            if let Some(secs) = poll_interval {
                config.scoop.poll_interval_secs = secs;
            }
            handle_scoop(&config, watch).await
        }
        Command::Check => handle_check(&config),
        Command::Status { history } => handle_status(&config, history),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("paritybit=info,warn"),
            1 => EnvFilter::new("paritybit=debug,info"),
            2 => EnvFilter::new("paritybit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs the crawler until done or interrupted
async fn handle_crawl(config: &Config, config_path: PathBuf) -> anyhow::Result<()> {
    let shutdown = install_ctrl_c_handler();

    if config.schedule.interval_minutes > 0.0 {
        tracing::info!(
            "Crawling every {} minutes (Ctrl+C to stop)",
            config.schedule.interval_minutes
        );
    } else {
        tracing::info!("Running a single crawl cycle");
    }

    let report = crawl(config, Some(config_path.as_path()), shutdown)
        .await
        .context("Crawl failed")?;

    if report.interrupted {
        tracing::info!("Crawl stopped before the cycle completed");
    } else {
        tracing::info!("Crawl completed successfully");
    }
    Ok(())
}

/// Runs one manual scan, or watches until Ctrl+C
async fn handle_scoop(config: &Config, watch: bool) -> anyhow::Result<()> {
    let mut engine = WatchEngine::from_config(config);

    if watch {
        let shutdown = install_ctrl_c_handler();
        engine.watch(&shutdown).await;
        return Ok(());
    }

    let outcome = engine
        .scan_all(Trigger::Manual)
        .context("Failed to write results store")?;
    println!(
        "Searched {} keyword(s) over {} file(s): {} hit(s)",
        outcome.searched.len(),
        outcome.files_scanned,
        outcome.hits
    );
    println!("Results: {}", config.paths.results_file.display());
    Ok(())
}

/// Handles the check mode: validates config and shows what would be crawled
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Paritybit Configuration Check ===\n");

    println!("Paths:");
    println!("  Source: {}", config.paths.source_dir.display());
    println!("  Keywords: {}", config.paths.keywords_file.display());
    println!("  Results: {}", config.paths.results_file.display());
    println!("  Dead ledger: {}", config.paths.ledger_path().display());
    println!("  Run marker: {}", config.paths.marker_path().display());

    println!("\nFetch:");
    match (&config.fetch.proxy, config.fetch.direct) {
        (_, true) => println!("  Transport: direct"),
        (Some(proxy), false) => println!("  Proxy: {}", proxy),
        (None, false) => println!("  Proxy: $TOR_SOCKS or local Tor default"),
    }
    println!(
        "  Timeouts: connect {}s, total {}s",
        config.fetch.connect_timeout_secs, config.fetch.total_timeout_secs
    );
    println!(
        "  Attempts: {} (backoff from {}ms), max body {} bytes",
        config.fetch.max_attempts, config.fetch.backoff_base_ms, config.fetch.max_bytes
    );

    println!("\nSchedule:");
    if config.schedule.interval_minutes > 0.0 {
        println!("  Every {} minutes", config.schedule.interval_minutes);
    } else {
        println!("  Single cycle");
    }
    println!("  Identity rotation: {}", config.schedule.rotate_identity);

    let sites = normalize_sites(&config.sites);
    let ledger = DeadLedger::load(config.paths.ledger_path());
    let now = Utc::now();

    println!("\nSites ({}):", sites.sites.len());
    for site in &sites.sites {
        let state = if !site.enabled {
            "disabled".to_string()
        } else if ledger.is_marked_dead(&site.key, now) {
            let until = ledger
                .get(&site.key)
                .map(|e| e.until.to_rfc3339())
                .unwrap_or_default();
            format!("dead until {}", until)
        } else {
            "active".to_string()
        };
        println!("  - {} [{}] {}", site.key, state, site.base_url);
        println!(
            "    pages {}, depth {}, polite {}-{}s, failures {}, retry {}h, versions {}",
            site.max_pages,
            site.max_depth,
            site.polite.0,
            site.polite.1,
            site.max_failures,
            site.retry_after.num_minutes() as f64 / 60.0,
            site.max_versions_per_page
        );
        for seed in site.seeds.iter().filter(|s| *s != &site.base_url) {
            println!("    * {}", seed);
        }
    }

    if !sites.skipped.is_empty() {
        println!("\nSkipped entries ({}):", sites.skipped.len());
        for skipped in &sites.skipped {
            println!("  - #{}: {}", skipped.index, skipped.reason);
        }
    }

    let stale: Vec<_> = ledger
        .entries()
        .iter()
        .filter(|(key, _)| !sites.sites.iter().any(|s| &s.key == *key))
        .collect();
    if !stale.is_empty() {
        println!("\nLedger entries for unknown sites ({}):", stale.len());
        for (key, entry) in stale {
            println!("  - {} until {}: {}", key, entry.until.to_rfc3339(), entry.reason);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} enabled site(s)", sites.enabled().count());

    Ok(())
}

/// Handles the status mode: summarizes the results store
fn handle_status(config: &Config, history: usize) -> anyhow::Result<()> {
    let path = &config.paths.results_file;
    let store = ResultsStore::load(path);

    println!("Results: {}\n", path.display());
    match store.last_run {
        Some(ts) => println!("Last search: {}", ts.to_rfc3339()),
        None => println!("Last search: never"),
    }

    println!("\nKeywords ({}, {} hit(s)):", store.keywords.len(), store.hit_count());
    for (keyword, result) in &store.keywords {
        let dead = result.hits.iter().filter(|h| h.dead).count();
        let archived = result.hits.iter().filter(|h| h.archived).count();
        println!(
            "  - {}: {} hit(s) ({} archived, {} dead), searched {}",
            keyword,
            result.hits.len(),
            archived,
            dead,
            result.last_searched_at.to_rfc3339()
        );
    }

    if !store.history.is_empty() {
        println!("\nRecent searches:");
        for entry in store.history.iter().take(history) {
            println!(
                "  {} [{}] {}",
                entry.ts.to_rfc3339(),
                entry.trigger,
                entry.updated_keywords.join(", ")
            );
        }
    }

    Ok(())
}
