use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Paritybit, as read from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub scoop: ScoopConfig,

    /// Raw site entries; see [`crate::config::normalize_sites`]
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteEntry>,
}

/// Filesystem layout shared by the crawler and the scooper
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Root of the per-site snapshot directories
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Newline-delimited keyword list
    #[serde(default = "default_keywords_file")]
    pub keywords_file: PathBuf,

    /// Results store written by the scooper
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,

    /// Dead-site ledger; defaults to `<source-dir>/dead_sites.json`
    #[serde(default)]
    pub ledger_file: Option<PathBuf>,

    /// Run-complete marker; defaults to `<source-dir>/run_complete`
    #[serde(default)]
    pub marker_file: Option<PathBuf>,
}

impl PathsConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_file
            .clone()
            .unwrap_or_else(|| self.source_dir.join("dead_sites.json"))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.marker_file
            .clone()
            .unwrap_or_else(|| self.source_dir.join("run_complete"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            keywords_file: default_keywords_file(),
            results_file: default_results_file(),
            ledger_file: None,
            marker_file: None,
        }
    }
}

/// HTTP fetch limits and transport settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Connect-phase timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Wall-clock budget per attempt, measured from request start, in seconds
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,

    /// Maximum body bytes kept per response
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Attempts per URL, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds; doubles on each retry
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// SOCKS proxy URL; falls back to `TOR_SOCKS`, then the local Tor default
    #[serde(default)]
    pub proxy: Option<String>,

    /// Disable the proxy entirely and connect directly
    #[serde(default)]
    pub direct: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_bytes: default_max_bytes(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            proxy: None,
            direct: false,
            user_agent: default_user_agent(),
        }
    }
}

/// Cycle scheduling
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    /// Minutes between cycles; 0 runs a single cycle
    #[serde(default)]
    pub interval_minutes: f64,

    /// Ask the proxy's control port for a fresh identity before each cycle
    #[serde(default)]
    pub rotate_identity: bool,
}

/// Anonymizing-transport control port
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControlConfig {
    #[serde(default = "default_control_address")]
    pub address: String,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            address: default_control_address(),
            password: None,
        }
    }
}

/// Keyword watch engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScoopConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Characters kept on each side of a match in a snippet
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,

    /// Snippets kept per keyword per file
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,

    /// Drop result entries for keywords removed from the keyword file
    #[serde(default)]
    pub prune_removed_keywords: bool,

    /// Entries kept in the results history log
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ScoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            snippet_radius: default_snippet_radius(),
            max_snippets: default_max_snippets(),
            prune_removed_keywords: false,
            history_limit: default_history_limit(),
        }
    }
}

/// A site entry as written in the config file
///
/// Either a bare URL string or a table with per-site limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SiteEntry {
    Url(String),
    Table(SiteTable),
}

/// Table form of a site entry; every limit is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteTable {
    #[serde(default, alias = "key", alias = "id")]
    pub name: Option<String>,
    #[serde(default, alias = "site")]
    pub url: Option<String>,
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub polite: Option<Vec<f64>>,
    #[serde(default)]
    pub max_failures: Option<u32>,
    #[serde(default)]
    pub retry_hours: Option<f64>,
    #[serde(default, alias = "max-versions")]
    pub max_versions_per_page: Option<usize>,
}

/// A normalized, validated site ready for crawling
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    /// Site key; names the storage directory and the ledger entry
    pub key: String,
    pub base_url: Url,
    pub seeds: Vec<Url>,
    pub max_pages: usize,
    pub max_depth: u32,
    /// Politeness delay range in seconds, `min <= max`
    pub polite: (f64, f64),
    pub max_failures: u32,
    pub retry_after: chrono::Duration,
    pub max_versions_per_page: usize,
    pub enabled: bool,
}

pub const DEFAULT_MAX_PAGES: usize = 50;
pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const DEFAULT_POLITE: (f64, f64) = (1.0, 3.0);
pub const DEFAULT_MAX_FAILURES: u32 = 5;
pub const DEFAULT_RETRY_HOURS: f64 = 24.0;
pub const DEFAULT_MAX_VERSIONS: usize = 5;

/// Upper bound on snippets kept per keyword per file
pub const MAX_SNIPPETS_PER_FILE: usize = 5;

/// Upper bound on entries in the results history log
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// Longest accepted dead-site retry window, ten years
pub const MAX_RETRY_HOURS: f64 = 10.0 * 365.0 * 24.0;

fn default_source_dir() -> PathBuf {
    PathBuf::from("Source")
}

fn default_keywords_file() -> PathBuf {
    PathBuf::from("keywords.txt")
}

fn default_results_file() -> PathBuf {
    PathBuf::from("results.json")
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}

fn default_control_address() -> String {
    "127.0.0.1:9051".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_snippet_radius() -> usize {
    80
}

fn default_max_snippets() -> usize {
    MAX_SNIPPETS_PER_FILE
}

fn default_history_limit() -> usize {
    MAX_HISTORY_ENTRIES
}
