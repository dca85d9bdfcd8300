//! Robots.txt handling module
//!
//! This module provides the robots policy consulted by the crawler: an
//! allow/deny predicate plus the `Request-rate` and `Crawl-delay` directives
//! that feed the rate limiter.

mod parser;

pub use parser::{product_token, ParsedRobots};

use crate::output::{CrawlEvent, EventSink};
use crate::{CrawlError, UrlError};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// A `Request-rate: N/M` directive: at most `requests` per `per`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRate {
    pub requests: u32,
    pub per: Duration,
}

/// The robots policy as seen by the crawl state machine
///
/// Implementations are read-only after construction and are shared between
/// workers.
pub trait RobotsPolicy: Send + Sync + fmt::Debug {
    /// Whether `user_agent` may fetch `url`
    fn can_fetch(&self, user_agent: &str, url: &str) -> bool;

    /// The `Request-rate` declared for `user_agent`, if any
    fn request_rate(&self, user_agent: &str) -> Option<RequestRate>;

    /// The `Crawl-delay` in seconds declared for `user_agent`, if any
    fn crawl_delay(&self, user_agent: &str) -> Option<f64>;
}

/// Resolves the robots file location against the seed URL
///
/// `robots_file` may be relative (`robots.txt`, `/robots.txt`) or absolute.
pub fn robots_url(seed: &Url, robots_file: &str) -> Result<Url, UrlError> {
    seed.join(robots_file)
        .map_err(|e| UrlError::Parse(format!("{}: {}", robots_file, e)))
}

/// Fetches and parses a robots file
///
/// # Returns
///
/// * `Ok(ParsedRobots)` - Parsed rules; 401/403 yield a deny-everything policy
/// * `Err(CrawlError)` - The file is missing or unreachable
pub async fn fetch_robots(
    client: &Client,
    robots_url: &Url,
    user_agent: &str,
) -> Result<ParsedRobots, CrawlError> {
    let response = client
        .get(robots_url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
        .map_err(|source| CrawlError::Http {
            url: robots_url.to_string(),
            source,
        })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Ok(ParsedRobots::disallow_all());
    }
    if !status.is_success() {
        return Err(CrawlError::Robots(format!("HTTP {} for {}", status, robots_url)));
    }

    let content = response.text().await.map_err(|source| CrawlError::Http {
        url: robots_url.to_string(),
        source,
    })?;
    Ok(ParsedRobots::from_content(&content))
}

/// Loads the robots policy, falling back to allow-all
///
/// A missing or unreachable robots file is never fatal: it is reported to
/// the sink and the crawl proceeds without restrictions.
pub async fn load_robots(
    client: &Client,
    robots_url: &Url,
    user_agent: &str,
    sink: &dyn EventSink,
) -> ParsedRobots {
    match fetch_robots(client, robots_url, user_agent).await {
        Ok(robots) => robots,
        Err(e) => {
            sink.emit(&CrawlEvent::PolicyUnavailable {
                robots_url: robots_url.to_string(),
                cause: e.to_string(),
            });
            ParsedRobots::allow_all()
        }
    }
}
