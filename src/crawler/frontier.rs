use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: Url,
    pub depth: u32,
}

/// Breadth-first frontier for one site
///
/// Strict FIFO. A URL is enqueued at most once, so a page reachable from
/// several parents keeps the depth of its first discovery.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    seen: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a frontier at depth 0
    pub fn with_seeds<'a>(seeds: impl IntoIterator<Item = &'a Url>) -> Self {
        let mut frontier = Self::new();
        for seed in seeds {
            frontier.push(seed.clone(), 0);
        }
        frontier
    }

    /// Enqueues `url` unless it was already seen; returns whether it was added
    pub fn push(&mut self, url: Url, depth: u32) -> bool {
        if !self.seen.insert(url.as_str().to_string()) {
            return false;
        }
        self.queue.push_back(QueuedUrl { url, depth });
        true
    }

    pub fn pop(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    /// Marks a URL visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.push(url("http://a.onion/1"), 0);
        frontier.push(url("http://a.onion/2"), 1);
        frontier.push(url("http://a.onion/3"), 1);

        let order: Vec<_> = std::iter::from_fn(|| frontier.pop())
            .map(|q| q.url.path().to_string())
            .collect();
        assert_eq!(order, vec!["/1", "/2", "/3"]);
    }

    #[test]
    fn test_duplicates_keep_first_depth() {
        let mut frontier = Frontier::with_seeds(&[url("http://a.onion/")]);
        assert!(frontier.push(url("http://a.onion/x"), 1));
        assert!(!frontier.push(url("http://a.onion/x"), 2));
        assert!(!frontier.push(url("http://a.onion/"), 1));
        assert_eq!(frontier.len(), 2);

        frontier.pop();
        assert_eq!(frontier.pop().map(|q| q.depth), Some(1));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_visited_tracking() {
        let mut frontier = Frontier::new();
        let page = url("http://a.onion/page");
        assert!(!frontier.is_visited(&page));
        assert!(frontier.mark_visited(&page));
        assert!(!frontier.mark_visited(&page));
        assert!(frontier.is_visited(&page));
        assert_eq!(frontier.visited_count(), 1);
    }
}
