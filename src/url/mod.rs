//! URL handling module for Paritybit
//!
//! This module provides URL normalization, host comparison and the filter that
//! keeps the crawler away from non-page resources.

mod domain;
mod normalize;

use url::Url;

pub use domain::{extract_domain, same_host};
pub use normalize::normalize_url;

/// Path extensions that never lead to a markup page
///
/// Archives, binaries, media, fonts and documents are skipped before any
/// request is made.
const SKIPPED_EXTENSIONS: &[&str] = &[
    // archives
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz", "zst",
    // binaries
    "exe", "msi", "dmg", "iso", "bin", "apk", "deb", "rpm", "jar",
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff",
    // audio and video
    "mp3", "mp4", "m4a", "avi", "mkv", "mov", "wav", "flac", "ogg", "webm", "wmv",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

/// Returns true if the URL's path ends in an extension from the skip set
///
/// # Examples
///
/// ```
/// use url::Url;
/// use paritybit::url::has_skipped_extension;
///
/// assert!(has_skipped_extension(&Url::parse("http://a.onion/dump.ZIP").unwrap()));
/// assert!(!has_skipped_extension(&Url::parse("http://a.onion/index.php").unwrap()));
/// ```
pub fn has_skipped_extension(url: &Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            SKIPPED_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Returns true if `link` lives on the same host as `base`
pub fn is_same_site(base: &Url, link: &Url) -> bool {
    match (base.host_str(), link.host_str()) {
        (Some(a), Some(b)) => same_host(a, b),
        _ => false,
    }
}
