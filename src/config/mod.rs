//! Configuration module for Paritybit
//!
//! This module handles loading, parsing and validating the TOML configuration
//! file, and normalizing its loosely-typed site entries into [`SiteConfig`]s.
//!
//! # Example
//!
//! ```no_run
//! use paritybit::config::{load_config, normalize_sites};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("paritybit.toml")).unwrap();
//! let sites = normalize_sites(&config.sites);
//! for skipped in &sites.skipped {
//!     eprintln!("site #{} skipped: {}", skipped.index, skipped.reason);
//! }
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, ControlConfig, FetchConfig, PathsConfig, ScheduleConfig, ScoopConfig, SiteConfig,
    SiteEntry, SiteTable, MAX_HISTORY_ENTRIES, MAX_RETRY_HOURS, MAX_SNIPPETS_PER_FILE,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{normalize_site, normalize_sites, validate, SiteSet, SkippedSite};
