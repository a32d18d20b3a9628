use crate::config::types::{
    Config, FetchConfig, ScoopConfig, SiteConfig, SiteEntry, SiteTable, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_FAILURES, DEFAULT_MAX_PAGES, DEFAULT_MAX_VERSIONS, DEFAULT_POLITE,
    DEFAULT_RETRY_HOURS, MAX_HISTORY_ENTRIES, MAX_RETRY_HOURS, MAX_SNIPPETS_PER_FILE,
};
use crate::url::{extract_domain, normalize_url};
use crate::ConfigError;
use std::collections::HashSet;

/// A site entry that was dropped during normalization, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSite {
    /// Position of the entry in the config file (0-based)
    pub index: usize,
    pub reason: String,
}

/// Result of normalizing the raw site list
#[derive(Debug, Clone, Default)]
pub struct SiteSet {
    /// Sites in config order, enabled or not
    pub sites: Vec<SiteConfig>,
    pub skipped: Vec<SkippedSite>,
}

impl SiteSet {
    /// Enabled sites, in config order
    pub fn enabled(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.iter().filter(|s| s.enabled)
    }
}

/// Validates the global (non-site) parts of the configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_scoop_config(&config.scoop)?;

    if !config.schedule.interval_minutes.is_finite() || config.schedule.interval_minutes < 0.0 {
        return Err(ConfigError::Validation(format!(
            "interval-minutes must be >= 0, got {}",
            config.schedule.interval_minutes
        )));
    }

    if config.paths.source_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "source-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.connect_timeout_secs == 0 || config.total_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch timeouts must be at least 1 second".to_string(),
        ));
    }

    if config.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-bytes must be > 0".to_string(),
        ));
    }

    if config.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        let parsed = url::Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
        if !parsed.scheme().starts_with("socks") && !parsed.scheme().starts_with("http") {
            return Err(ConfigError::Validation(format!(
                "Proxy '{}' must be a socks or http URL",
                proxy
            )));
        }
    }

    Ok(())
}

fn validate_scoop_config(config: &ScoopConfig) -> Result<(), ConfigError> {
    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "poll-interval-secs must be >= 1".to_string(),
        ));
    }

    if config.max_snippets == 0 || config.max_snippets > MAX_SNIPPETS_PER_FILE {
        return Err(ConfigError::Validation(format!(
            "max-snippets must be between 1 and {}, got {}",
            MAX_SNIPPETS_PER_FILE, config.max_snippets
        )));
    }

    if config.history_limit == 0 || config.history_limit > MAX_HISTORY_ENTRIES {
        return Err(ConfigError::Validation(format!(
            "history-limit must be between 1 and {}, got {}",
            MAX_HISTORY_ENTRIES, config.history_limit
        )));
    }

    Ok(())
}

/// Normalizes raw site entries into [`SiteConfig`]s
///
/// Malformed entries are not fatal: each one is skipped and reported with its
/// index and reason so the caller can log it. Later entries whose key repeats
/// an earlier one are skipped as well.
pub fn normalize_sites(entries: &[SiteEntry]) -> SiteSet {
    let mut set = SiteSet::default();
    let mut seen_keys = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        match normalize_site(index, entry) {
            Ok(site) => {
                if !seen_keys.insert(site.key.clone()) {
                    set.skipped.push(SkippedSite {
                        index,
                        reason: format!("duplicate site key '{}'", site.key),
                    });
                    continue;
                }
                set.sites.push(site);
            }
            Err(ConfigError::InvalidSite { index, reason }) => {
                set.skipped.push(SkippedSite { index, reason });
            }
            Err(other) => {
                set.skipped.push(SkippedSite {
                    index,
                    reason: other.to_string(),
                });
            }
        }
    }

    set
}

/// Normalizes a single site entry
pub fn normalize_site(index: usize, entry: &SiteEntry) -> Result<SiteConfig, ConfigError> {
    let table = match entry {
        SiteEntry::Url(url) => SiteTable {
            url: Some(url.clone()),
            ..SiteTable::default()
        },
        SiteEntry::Table(table) => table.clone(),
    };

    let invalid = |reason: String| ConfigError::InvalidSite { index, reason };

    let raw_url = table
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| invalid("missing url".to_string()))?;

    let base_url = normalize_url(raw_url)
        .map_err(|e| invalid(format!("invalid url '{}': {}", raw_url, e)))?;

    let key = match table.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => sanitize_key(name),
        None => extract_domain(&base_url)
            .map(|host| sanitize_key(&host))
            .ok_or_else(|| invalid(format!("url '{}' has no host", raw_url)))?,
    };

    // Dot-prefixed directories are hidden from the scooper's site listing
    if key.is_empty() || key.starts_with('.') {
        return Err(invalid(format!("unusable site key '{}'", key)));
    }

    let seeds = if table.seeds.is_empty() {
        vec![base_url.clone()]
    } else {
        table
            .seeds
            .iter()
            .map(|seed| {
                normalize_url(seed).map_err(|e| invalid(format!("invalid seed '{}': {}", seed, e)))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let polite = match table.polite.as_deref() {
        None => DEFAULT_POLITE,
        Some([fixed]) => (*fixed, *fixed),
        Some([min, max]) => (*min, *max),
        Some(other) => {
            return Err(invalid(format!(
                "polite must be [min, max] seconds, got {} values",
                other.len()
            )))
        }
    };

    if !polite.0.is_finite() || !polite.1.is_finite() || polite.0 < 0.0 || polite.0 > polite.1 {
        return Err(invalid(format!(
            "polite range must satisfy 0 <= min <= max, got [{}, {}]",
            polite.0, polite.1
        )));
    }

    let max_pages = table.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
    if max_pages == 0 {
        return Err(invalid("max-pages must be >= 1".to_string()));
    }

    let max_failures = table.max_failures.unwrap_or(DEFAULT_MAX_FAILURES);
    if max_failures == 0 {
        return Err(invalid("max-failures must be >= 1".to_string()));
    }

    let max_versions_per_page = table.max_versions_per_page.unwrap_or(DEFAULT_MAX_VERSIONS);
    if max_versions_per_page == 0 {
        return Err(invalid("max-versions-per-page must be >= 1".to_string()));
    }

    let retry_hours = table.retry_hours.unwrap_or(DEFAULT_RETRY_HOURS);
    if !retry_hours.is_finite() || !(0.0..=MAX_RETRY_HOURS).contains(&retry_hours) {
        return Err(invalid(format!(
            "retry-hours must be between 0 and {}, got {}",
            MAX_RETRY_HOURS, retry_hours
        )));
    }
    let retry_after = chrono::Duration::seconds((retry_hours * 3600.0).round() as i64);

    Ok(SiteConfig {
        key,
        base_url,
        seeds,
        max_pages,
        max_depth: table.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        polite,
        max_failures,
        retry_after,
        max_versions_per_page,
        enabled: table.enabled.unwrap_or(true),
    })
}

/// Turns a site name into a safe single-segment directory name
fn sanitize_key(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
