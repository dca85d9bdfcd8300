//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The frontier (visited set and pending queue) and its scope filter
//! - Sliding-window rate limiting
//! - HTTP fetching and HTML link extraction
//! - The engine that runs workers over all of the above

mod engine;
mod fetcher;
mod frontier;
mod parser;
mod policy;
mod rate_limiter;
mod scope;

pub use engine::{CrawlEngine, CrawlReport, ShutdownHandle};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use frontier::{Admission, CrawlFrontier};
pub use parser::extract_links;
pub use policy::{Policy, RateSource};
pub use rate_limiter::{RateLimiter, SharedRateLimiter, MAX_PER_UNIT};
pub use scope::{RejectReason, ScopeFilter, Verdict};

use crate::config::Config;
use crate::output::TracingSink;
use crate::CrawlError;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration
/// 2. Build the HTTP client
/// 3. Fetch the robots policy and resolve the crawl rate
/// 4. Fetch pages and follow in-scope links until none remain
///
/// Events are reported through `tracing`.
///
/// # Example
///
/// ```no_run
/// use polite_crawler::config::Config;
/// use polite_crawler::crawler::crawl;
///
/// # async fn example() -> Result<(), polite_crawler::CrawlError> {
/// let mut config = Config::default();
/// config.crawler.seed = Some("https://example.com/".to_string());
/// let report = crawl(&config).await?;
/// for url in &report.visited {
///     println!("{}", url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: &Config) -> Result<CrawlReport, CrawlError> {
    CrawlEngine::from_config(config, Arc::new(TracingSink))
        .await?
        .run()
        .await
}
