use std::path::Path;

/// Keyword list as read from the keyword file
///
/// Blank lines and `#` comments are ignored, surrounding whitespace is
/// trimmed, and duplicates keep their first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut set = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !set.contains(line) {
                set.keywords.push(line.to_string());
            }
        }
        set
    }

    /// Reads the keyword file; a missing or unreadable file is an empty set
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::parse(&String::from_utf8_lossy(&bytes)),
            Err(e) => {
                tracing::debug!("No keywords from {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    /// Keywords in `self` that `previous` did not have, in file order
    pub fn added_since(&self, previous: &KeywordSet) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| !previous.contains(k))
            .cloned()
            .collect()
    }

    /// Keywords `previous` had that `self` no longer has
    pub fn removed_since(&self, previous: &KeywordSet) -> Vec<String> {
        previous.added_since(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
