//! Keyword search over the corpus

use crate::config::{ScoopConfig, MAX_SNIPPETS_PER_FILE};
use crate::crawler::extract_text;
use crate::scoop::corpus::CorpusEntry;
use crate::scoop::results::Hit;
use crate::state::DeadLedger;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use url::Url;

/// Snippet shape
#[derive(Debug, Clone, Copy)]
pub struct SnippetOptions {
    /// Characters kept on each side of a match
    pub radius: usize,
    /// Occurrences turned into snippets per file
    pub max_snippets: usize,
}

impl From<&ScoopConfig> for SnippetOptions {
    fn from(config: &ScoopConfig) -> Self {
        Self {
            radius: config.snippet_radius,
            max_snippets: config.max_snippets,
        }
    }
}

/// Context windows around the first occurrences of `keyword` in `text`
///
/// Both arguments must already be case-folded. Each window holds up to
/// `radius` characters on either side, fewer at the edges of the text, with
/// the match itself upper-cased. Never more than five windows per call.
pub fn snippets(text: &str, keyword: &str, options: SnippetOptions) -> Vec<String> {
    if keyword.is_empty() || options.max_snippets == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let keyword_len = keyword.chars().count();

    text.match_indices(keyword)
        .take(options.max_snippets.min(MAX_SNIPPETS_PER_FILE))
        .map(|(byte_offset, _)| {
            let start = text[..byte_offset].chars().count();
            let end = start + keyword_len;
            let from = start.saturating_sub(options.radius);
            let to = (end + options.radius).min(chars.len());

            let mut snippet: String = chars[from..start].iter().collect();
            let matched: String = chars[start..end].iter().collect();
            snippet.push_str(&matched.to_uppercase());
            snippet.extend(&chars[end..to]);
            snippet
        })
        .collect()
}

/// Whether the ledger currently excludes the hit's host or site
fn is_dead(ledger: &DeadLedger, entry: &CorpusEntry, now: DateTime<Utc>) -> bool {
    let host = entry
        .page_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string));

    host.map(|h| ledger.is_marked_dead(&h, now)).unwrap_or(false)
        || ledger.is_marked_dead(&entry.site, now)
}

/// Searches `corpus` for each keyword
///
/// Every searched keyword gets an entry, possibly empty, so a merge replaces
/// stale hits wholesale. Unreadable files are skipped.
pub fn search(
    keywords: &[String],
    corpus: &[CorpusEntry],
    ledger: &DeadLedger,
    options: SnippetOptions,
    now: DateTime<Utc>,
) -> BTreeMap<String, Vec<Hit>> {
    let mut hits: BTreeMap<String, Vec<Hit>> = keywords
        .iter()
        .map(|k| (k.clone(), Vec::new()))
        .collect();
    let folded_keywords: Vec<(String, String)> = keywords
        .iter()
        .map(|k| (k.clone(), k.to_lowercase()))
        .collect();

    for entry in corpus {
        let bytes = match std::fs::read(&entry.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", entry.path.display(), e);
                continue;
            }
        };
        let text = extract_text(&String::from_utf8_lossy(&bytes)).to_lowercase();

        for (keyword, folded) in &folded_keywords {
            if !text.contains(folded.as_str()) {
                continue;
            }
            let found = snippets(&text, folded, options);
            if let Some(list) = hits.get_mut(keyword) {
                list.push(Hit {
                    site: entry.site.clone(),
                    url: entry.page_url.clone(),
                    file: entry.path.display().to_string(),
                    archived: entry.record.archived,
                    dead: is_dead(ledger, entry, now),
                    snippets: found,
                    found_at: now,
                });
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageRecord;
    use chrono::Duration;
    use tempfile::TempDir;

    const OPTS: SnippetOptions = SnippetOptions {
        radius: 4,
        max_snippets: 5,
    };

    #[test]
    fn test_snippet_window_and_upcase() {
        let text = "the quick brown fox jumps";
        assert_eq!(snippets(text, "brown", OPTS), vec!["ick BROWN fox"]);
    }

    #[test]
    fn test_snippet_clipped_at_edges() {
        assert_eq!(snippets("fox at start", "fox", OPTS), vec!["FOX at "]);
        assert_eq!(snippets("ends in fox", "fox", OPTS), vec![" in FOX"]);
    }

    #[test]
    fn test_snippet_counts_characters_not_bytes() {
        let text = "ééééé needle ààààà";
        assert_eq!(snippets(text, "needle", OPTS), vec!["ééé NEEDLE ààà"]);
    }

    #[test]
    fn test_at_most_max_snippets() {
        let text = "x ".repeat(20);
        let opts = SnippetOptions {
            radius: 1,
            max_snippets: 5,
        };
        assert_eq!(snippets(&text, "x", opts).len(), 5);
    }

    #[test]
    fn test_snippets_capped_at_five_per_file() {
        let text = "x ".repeat(20);
        let opts = SnippetOptions {
            radius: 1,
            max_snippets: 50,
        };
        assert_eq!(snippets(&text, "x", opts).len(), 5);
    }

    fn entry(dir: &TempDir, name: &str, html: &str, url: Option<&str>) -> CorpusEntry {
        let path = dir.path().join(name);
        std::fs::write(&path, html).unwrap();
        CorpusEntry {
            site: "site".to_string(),
            page_url: url.map(str::to_string),
            snapshot_id: name.to_string(),
            path,
            record: PageRecord {
                archived: true,
                ..PageRecord::default()
            },
        }
    }

    #[test]
    fn test_search_case_insensitive_with_flags() {
        let dir = TempDir::new().unwrap();
        let mut ledger = DeadLedger::load(dir.path().join("dead_sites.json"));
        let now = Utc::now();
        ledger
            .mark_dead_at("dead.onion", "test", Duration::hours(1), now)
            .unwrap();

        let corpus = vec![
            entry(&dir, "a.html", "<p>Selling WIDGETS here</p>", Some("http://dead.onion/a")),
            entry(&dir, "b.html", "<p>nothing</p>", Some("http://live.onion/b")),
        ];
        let keywords = vec!["widgets".to_string(), "absent".to_string()];

        let hits = search(&keywords, &corpus, &ledger, OPTS, now);
        assert_eq!(hits.len(), 2);
        assert!(hits["absent"].is_empty());

        let widget_hits = &hits["widgets"];
        assert_eq!(widget_hits.len(), 1);
        assert_eq!(widget_hits[0].url.as_deref(), Some("http://dead.onion/a"));
        assert!(widget_hits[0].archived);
        assert!(widget_hits[0].dead);
        assert_eq!(widget_hits[0].snippets, vec!["ing WIDGETS her"]);
    }

    #[test]
    fn test_script_text_is_not_searched() {
        let dir = TempDir::new().unwrap();
        let ledger = DeadLedger::load(dir.path().join("dead_sites.json"));
        let corpus = vec![entry(&dir, "a.html", "<script>var secret = 1;</script><p>hi</p>", None)];

        let hits = search(&["secret".to_string()], &corpus, &ledger, OPTS, Utc::now());
        assert!(hits["secret"].is_empty());
    }
}
