//! Paritybit: a versioning crawler and keyword scooper for anonymized sites
//!
//! This crate implements two independent engines that meet only through files:
//! a crawler that fetches configured sites through a SOCKS proxy and keeps
//! per-page snapshot histories, and a scooper that watches the keyword list and
//! the crawler's run-complete marker and records keyword hits.

pub mod config;
pub mod control;
pub mod crawler;
pub mod scoop;
pub mod shutdown;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Paritybit operations
#[derive(Debug, Error)]
pub enum ScoopError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Control channel error: {0}")]
    Control(#[from] control::ControlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid site entry #{index}: {reason}")]
    InvalidSite { index: usize, reason: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Paritybit operations
pub type Result<T> = std::result::Result<T, ScoopError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, SiteConfig};
pub use state::DeadLedger;
pub use url::{extract_domain, normalize_url};
