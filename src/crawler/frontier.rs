//! Crawl frontier: the visited set plus the FIFO queue of pending URLs
//!
//! A URL enters `visited` at the moment it is accepted into `pending`, so
//! `pending` is always a subset of `visited` and a link discovered from
//! several pages is queued only once. `visited` never shrinks.

use crate::crawler::scope::{RejectReason, ScopeFilter, Verdict};
use crate::output::{CrawlEvent, EventSink};
use crate::url::{canonicalize, CanonicalUrl};
use crate::UrlError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Result of offering a raw URL to the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Queued under its canonical form
    Admitted(CanonicalUrl),
    /// Canonicalized but filtered out
    Rejected(CanonicalUrl, RejectReason),
    /// Could not be canonicalized
    Malformed(UrlError),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(_, reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Owns the visited set and pending queue
pub struct CrawlFrontier {
    visited: HashSet<CanonicalUrl>,
    pending: VecDeque<CanonicalUrl>,
    filter: ScopeFilter,
    ignore_queries: bool,
    sink: Arc<dyn EventSink>,
    /// URLs already granted their single deferred re-attempt
    deferred: HashSet<CanonicalUrl>,
    rejections: HashMap<RejectReason, u64>,
    malformed: u64,
}

impl CrawlFrontier {
    /// Creates a frontier seeded with exactly one URL
    ///
    /// The seed bypasses the scope filter, and the filter is bounded by the
    /// seed's own authority. Only an unparseable seed fails.
    pub fn new(
        seed: &str,
        ignore_queries: bool,
        filter: ScopeFilter,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, UrlError> {
        let seed = canonicalize(seed, ignore_queries)?;
        let filter = filter.rescoped(seed.authority());

        let mut frontier = Self {
            visited: HashSet::new(),
            pending: VecDeque::new(),
            filter,
            ignore_queries,
            sink,
            deferred: HashSet::new(),
            rejections: HashMap::new(),
            malformed: 0,
        };
        frontier.accept(seed);
        Ok(frontier)
    }

    /// Offers a discovered URL; returns true if it was queued
    pub fn add_url_to_visit(&mut self, raw_url: &str) -> bool {
        self.offer(raw_url).is_admitted()
    }

    /// Offers a discovered URL and reports the detailed outcome
    ///
    /// Rejections and malformed URLs are reported to the event sink and
    /// otherwise have no effect.
    pub fn offer(&mut self, raw_url: &str) -> Admission {
        let candidate = match canonicalize(raw_url, self.ignore_queries) {
            Ok(candidate) => candidate,
            Err(error) => {
                self.malformed += 1;
                self.sink.emit(&CrawlEvent::Malformed {
                    raw: raw_url.to_string(),
                    error: error.to_string(),
                });
                return Admission::Malformed(error);
            }
        };

        match self.filter.evaluate(&candidate, &self.visited) {
            Verdict::Admit => {
                self.sink.emit(&CrawlEvent::Enqueued {
                    url: candidate.to_string(),
                });
                self.accept(candidate.clone());
                Admission::Admitted(candidate)
            }
            Verdict::Reject(reason) => {
                *self.rejections.entry(reason).or_insert(0) += 1;
                self.sink.emit(&CrawlEvent::Rejected {
                    url: candidate.to_string(),
                    reason,
                });
                Admission::Rejected(candidate, reason)
            }
        }
    }

    fn accept(&mut self, url: CanonicalUrl) {
        self.visited.insert(url.clone());
        self.pending.push_back(url);
    }

    /// Pops the head of the pending queue
    pub fn visit_next(&mut self) -> Option<CanonicalUrl> {
        self.pending.pop_front()
    }

    /// Re-appends a dequeued URL once, for a deferred re-attempt
    ///
    /// Returns false if the URL was never visited or already had its retry.
    pub fn defer(&mut self, url: CanonicalUrl) -> bool {
        if !self.visited.contains(&url) || !self.deferred.insert(url.clone()) {
            return false;
        }
        self.pending.push_back(url);
        true
    }

    pub fn has_more_to_visit(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn remaining_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// The visited set, sorted for stable output
    pub fn visited_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.visited.iter().map(|u| u.to_string()).collect();
        urls.sort();
        urls
    }

    /// The authority that bounds this crawl
    pub fn scope_authority(&self) -> &str {
        self.filter.scope_authority()
    }

    pub fn rejections(&self) -> &HashMap<RejectReason, u64> {
        &self.rejections
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    #[cfg(test)]
    fn pending_is_subset_of_visited(&self) -> bool {
        self.pending.iter().all(|url| self.visited.contains(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemorySink, NullSink};
    use crate::robots::ParsedRobots;
    use crate::url::ScopeMode;

    fn frontier_with(seed: &str, robots: ParsedRobots, ignore_queries: bool) -> CrawlFrontier {
        let authority = canonicalize(seed, ignore_queries).unwrap().authority().to_string();
        let filter = ScopeFilter::new(authority, ScopeMode::Suffix, "TestBot", Arc::new(robots));
        CrawlFrontier::new(seed, ignore_queries, filter, Arc::new(NullSink)).unwrap()
    }

    fn frontier(seed: &str) -> CrawlFrontier {
        frontier_with(seed, ParsedRobots::allow_all(), false)
    }

    #[test]
    fn test_seeded_with_one_url() {
        let mut frontier = frontier("http://a.com/");
        assert!(frontier.has_more_to_visit());
        assert_eq!(frontier.remaining_count(), 1);
        assert!(frontier.is_visited("http://a.com"));
        assert_eq!(frontier.scope_authority(), "a.com");

        assert_eq!(frontier.visit_next().unwrap().as_str(), "http://a.com");
        assert!(!frontier.has_more_to_visit());
        assert_eq!(frontier.visit_next(), None);
        // Dequeuing does not touch visited
        assert!(frontier.is_visited("http://a.com"));
    }

    #[test]
    fn test_seed_bypasses_robots() {
        let frontier = frontier_with("http://a.com/", ParsedRobots::disallow_all(), false);
        assert_eq!(frontier.remaining_count(), 1);
    }

    #[test]
    fn test_seed_applies_ignore_queries() {
        let frontier = frontier_with("http://a.com/?x=1", ParsedRobots::allow_all(), true);
        assert!(frontier.is_visited("http://a.com"));
    }

    #[test]
    fn test_malformed_seed_fails() {
        let filter = ScopeFilter::new(
            "a.com",
            ScopeMode::Suffix,
            "TestBot",
            Arc::new(ParsedRobots::allow_all()),
        );
        assert!(CrawlFrontier::new("::nonsense::", false, filter, Arc::new(NullSink)).is_err());
    }

    #[test]
    fn test_scope_follows_seed_authority() {
        let filter = ScopeFilter::new(
            "b.com",
            ScopeMode::Subdomain,
            "TestBot",
            Arc::new(ParsedRobots::allow_all()),
        );
        let mut frontier =
            CrawlFrontier::new("http://www.a.com/", false, filter, Arc::new(NullSink)).unwrap();

        assert_eq!(frontier.scope_authority(), "www.a.com");
        assert!(frontier.add_url_to_visit("http://www.a.com/page"));
        assert!(frontier.add_url_to_visit("http://blog.www.a.com/"));
        assert_eq!(
            frontier.offer("http://b.com/page").reason(),
            Some(RejectReason::OutOfScope)
        );
    }

    #[test]
    fn test_add_once_then_duplicate() {
        let mut frontier = frontier("http://a.com");
        assert!(frontier.add_url_to_visit("http://a.com/page"));
        assert!(!frontier.add_url_to_visit("http://a.com/page"));
        assert_eq!(
            frontier.offer("http://a.com/page/#again").reason(),
            Some(RejectReason::Duplicate)
        );
        assert_eq!(frontier.remaining_count(), 2);
    }

    #[test]
    fn test_out_of_scope_reported() {
        let sink = Arc::new(MemorySink::new());
        let filter = ScopeFilter::new(
            "a.com",
            ScopeMode::Suffix,
            "TestBot",
            Arc::new(ParsedRobots::allow_all()),
        );
        let mut frontier = CrawlFrontier::new("http://a.com", false, filter, sink.clone()).unwrap();

        assert!(!frontier.add_url_to_visit("http://other.com/page"));
        assert_eq!(
            sink.rejections(),
            vec![("http://other.com/page".to_string(), RejectReason::OutOfScope)]
        );
        assert_eq!(frontier.rejections().get(&RejectReason::OutOfScope), Some(&1));
        assert!(!frontier.is_visited("http://other.com/page"));
    }

    #[test]
    fn test_policy_denied_not_visited() {
        let mut frontier = frontier_with(
            "http://a.com",
            ParsedRobots::from_content("User-agent: *\nDisallow: /admin"),
            false,
        );
        assert_eq!(
            frontier.offer("http://a.com/admin/users").reason(),
            Some(RejectReason::PolicyDenied)
        );
        assert!(!frontier.is_visited("http://a.com/admin/users"));
    }

    #[test]
    fn test_malformed_is_dropped() {
        let mut frontier = frontier("http://a.com");
        assert!(!frontier.add_url_to_visit("http://"));
        assert!(!frontier.add_url_to_visit("mailto:me@a.com"));
        assert_eq!(frontier.malformed_count(), 2);
        assert_eq!(frontier.remaining_count(), 1);
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = frontier("http://a.com");
        frontier.add_url_to_visit("http://a.com/1");
        frontier.add_url_to_visit("http://a.com/2");
        frontier.add_url_to_visit("http://a.com/3");

        let order: Vec<String> = std::iter::from_fn(|| frontier.visit_next())
            .map(CanonicalUrl::into_string)
            .collect();
        assert_eq!(
            order,
            vec!["http://a.com", "http://a.com/1", "http://a.com/2", "http://a.com/3"]
        );
    }

    #[test]
    fn test_variants_admitted_at_most_once() {
        let mut frontier = frontier_with("http://a.com", ParsedRobots::allow_all(), true);
        let variants = [
            "http://a.com/x",
            "http://a.com/x/",
            "http://a.com//x//",
            "http://a.com/x#frag",
            "http://a.com/x?q=1",
            "http://A.COM/x",
        ];
        let admitted = variants
            .iter()
            .filter(|raw| frontier.add_url_to_visit(raw))
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_pending_subset_of_visited() {
        let mut frontier = frontier("http://a.com");
        for i in 0..20 {
            frontier.add_url_to_visit(&format!("http://a.com/{}", i % 7));
            if i % 3 == 0 {
                frontier.visit_next();
            }
            frontier.add_url_to_visit("http://elsewhere.org/");
            assert!(frontier.pending_is_subset_of_visited());
        }
    }

    #[test]
    fn test_defer_once() {
        let mut frontier = frontier("http://a.com");
        let seed = frontier.visit_next().unwrap();

        assert!(frontier.defer(seed.clone()));
        assert_eq!(frontier.remaining_count(), 1);
        assert!(frontier.pending_is_subset_of_visited());

        let again = frontier.visit_next().unwrap();
        assert!(!frontier.defer(again));
        assert!(!frontier.has_more_to_visit());
    }

    #[test]
    fn test_defer_rejects_unknown_url() {
        let mut frontier = frontier("http://a.com");
        let stranger = canonicalize("http://a.com/never-seen", false).unwrap();
        assert!(!frontier.defer(stranger));
    }

    #[test]
    fn test_visited_urls_sorted() {
        let mut frontier = frontier("http://a.com");
        frontier.add_url_to_visit("http://a.com/b");
        frontier.add_url_to_visit("http://a.com/a");
        assert_eq!(
            frontier.visited_urls(),
            vec!["http://a.com", "http://a.com/a", "http://a.com/b"]
        );
        assert_eq!(frontier.visited_count(), 3);
    }
}
