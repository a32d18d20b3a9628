use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use paritybit::url::extract_domain;
///
/// let url = Url::parse("http://Forum.Example.onion/t/1").unwrap();
/// assert_eq!(extract_domain(&url), Some("forum.example.onion".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if two hosts name the same site
///
/// Comparison is case-insensitive and ignores a leading `www.` on either side.
pub fn same_host(a: &str, b: &str) -> bool {
    strip_www(&a.to_lowercase()) == strip_www(&b.to_lowercase())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
