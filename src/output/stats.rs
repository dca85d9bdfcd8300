//! Crawl statistics
//!
//! Workers record outcomes into a lock-free [`StatsRecorder`]; the engine
//! takes a [`CrawlStatistics`] snapshot when the crawl drains.

use crate::crawler::RejectReason;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Number of URLs in the visited set
    pub visited: u64,

    /// Pages fetched successfully
    pub pages_fetched: u64,

    /// Fetches that ended in an HTTP or network error
    pub pages_failed: u64,

    /// Successful fetches whose body was not HTML
    pub pages_not_html: u64,

    /// Deferred re-attempts after transient errors
    pub retries: u64,

    /// Number of times a task had to wait for the rate limiter
    pub rate_waits: u64,

    /// Total time spent waiting on the rate limiter
    pub total_wait: Duration,

    /// Discovered links rejected, by reason
    pub rejections: HashMap<RejectReason, u64>,

    /// Discovered links dropped because they could not be canonicalized
    pub malformed: u64,
}

/// Shared counters updated by crawl workers
#[derive(Debug, Default)]
pub struct StatsRecorder {
    pages_fetched: AtomicU64,
    pages_failed: AtomicU64,
    pages_not_html: AtomicU64,
    retries: AtomicU64,
    rate_waits: AtomicU64,
    wait_micros: AtomicU64,
}

impl StatsRecorder {
    pub fn record_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_html(&self) {
        self.pages_not_html.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait(&self, wait: Duration) {
        self.rate_waits.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(wait.as_micros()).unwrap_or(u64::MAX);
        self.wait_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Builds a statistics snapshot
    ///
    /// Visited, rejection and malformed counts are owned by the frontier and
    /// passed in here.
    pub fn snapshot(
        &self,
        visited: usize,
        rejections: HashMap<RejectReason, u64>,
        malformed: u64,
    ) -> CrawlStatistics {
        CrawlStatistics {
            visited: visited as u64,
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            pages_not_html: self.pages_not_html.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_waits: self.rate_waits.load(Ordering::Relaxed),
            total_wait: Duration::from_micros(self.wait_micros.load(Ordering::Relaxed)),
            rejections,
            malformed,
        }
    }
}

/// Prints statistics to stderr in a formatted manner
///
/// Stdout is reserved for the visited URL list.
pub fn print_statistics(stats: &CrawlStatistics) {
    eprintln!("=== Crawl Statistics ===\n");

    eprintln!("Overview:");
    eprintln!("  URLs visited: {}", stats.visited);
    eprintln!("  Pages fetched: {}", stats.pages_fetched);
    eprintln!("  Non-HTML pages: {}", stats.pages_not_html);
    eprintln!("  Failed fetches: {}", stats.pages_failed);
    eprintln!("  Deferred retries: {}", stats.retries);
    eprintln!();

    eprintln!("Rate Limiting:");
    eprintln!("  Waits: {}", stats.rate_waits);
    eprintln!("  Time waiting: {:.2}s", stats.total_wait.as_secs_f64());
    eprintln!();

    if !stats.rejections.is_empty() || stats.malformed > 0 {
        eprintln!("Rejected Links:");
        let mut reasons: Vec<_> = stats.rejections.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));

        for (reason, count) in reasons {
            eprintln!("  {}: {}", reason, count);
        }
        if stats.malformed > 0 {
            eprintln!("  MALFORMED: {}", stats.malformed);
        }
        eprintln!();
    }

    let attempted = stats.pages_fetched + stats.pages_failed;
    let success_rate = if attempted > 0 {
        (stats.pages_fetched as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    eprintln!(
        "Success Rate: {:.1}% ({} / {} fetches succeeded)",
        success_rate, stats.pages_fetched, attempted
    );
}
