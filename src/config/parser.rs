use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Only the global settings are validated here. Site entries are normalized
/// separately by [`crate::config::normalize_sites`] because a malformed site
/// is skipped rather than fatal.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use paritybit::config::load_config;
///
/// let config = load_config(Path::new("paritybit.toml")).unwrap();
/// println!("Snapshots live under {}", config.paths.source_dir.display());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so operators can tell when the site list changed between
/// runs.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize_sites, SiteEntry};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[paths]
source-dir = "/var/lib/paritybit/Source"

[fetch]
max-attempts = 4
proxy = "socks5h://127.0.0.1:9150"

[schedule]
interval-minutes = 30
rotate-identity = true

[[site]]
name = "forum"
url = "http://forum.onion/"
max-pages = 20
polite = [0.5, 1.5]

[[site]]
url = "http://market.onion/"
enabled = false
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(
            config.paths.source_dir,
            PathBuf::from("/var/lib/paritybit/Source")
        );
        assert_eq!(
            config.paths.ledger_path(),
            PathBuf::from("/var/lib/paritybit/Source/dead_sites.json")
        );
        assert_eq!(config.fetch.max_attempts, 4);
        assert_eq!(config.fetch.total_timeout_secs, 30);
        assert!(config.schedule.rotate_identity);
        assert_eq!(config.sites.len(), 2);

        let set = normalize_sites(&config.sites);
        assert_eq!(set.sites.len(), 2);
        assert_eq!(set.enabled().count(), 1);
        assert_eq!(set.sites[0].key, "forum");
        assert_eq!(set.sites[0].max_pages, 20);
    }

    #[test]
    fn test_mixed_site_array() {
        let config_content = r#"
site = [
    "http://a.onion/",
    { name = "b", url = "http://b.onion/", max-depth = 0 },
]
"#;
        let config = parse_config(config_content).unwrap();
        assert!(matches!(config.sites[0], SiteEntry::Url(_)));
        assert!(matches!(config.sites[1], SiteEntry::Table(_)));

        let set = normalize_sites(&config.sites);
        assert_eq!(set.sites[1].max_depth, 0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.sites.is_empty());
        assert_eq!(config.scoop.poll_interval_secs, 10);
        assert_eq!(config.scoop.max_snippets, 5);
        assert_eq!(config.paths.marker_path(), PathBuf::from("Source/run_complete"));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/paritybit.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[fetch]\nmax-attempts = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let result = parse_config("[fetch]\nproxy = \"ftp://127.0.0.1:21\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_scoop_caps_enforced() {
        let result = parse_config("[scoop]\nhistory-limit = 500\n");
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));

        let result = parse_config("[scoop]\nmax-snippets = 50\n");
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));

        let config = parse_config("[scoop]\nhistory-limit = 100\nmax-snippets = 5\n").unwrap();
        assert_eq!(config.scoop.history_limit, 100);
        assert_eq!(config.scoop.max_snippets, 5);
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");
        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");
        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
