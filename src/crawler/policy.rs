//! Crawl policy resolved once at startup
//!
//! Rate settings come from two sources. A robots `Request-rate` wins, then
//! a robots `Crawl-delay` (one task per delay), then the caller's defaults.

use crate::config::Config;
use crate::crawler::{RateLimiter, MAX_PER_UNIT};
use crate::robots::RobotsPolicy;
use crate::url::{canonicalize, ScopeMode};
use crate::ConfigError;
use std::time::Duration;

/// Where the effective rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    RequestRate,
    CrawlDelay,
    Defaults,
}

/// Read-only crawl settings shared by every component
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub user_agent: String,
    pub tasks_per: u32,
    pub per_unit: Duration,
    pub ignore_queries: bool,
    /// Authority of the seed URL, bounding the crawl
    pub scope_netloc: String,
    pub scope_mode: ScopeMode,
    pub rate_source: RateSource,
}

impl Policy {
    /// Resolves the policy from configuration and the site's robots rules
    ///
    /// Robots values of zero are treated as absent and windows longer than
    /// [`MAX_PER_UNIT`] are shortened to it. The caller's defaults
    /// must be valid (see [`crate::config::validate`]); invalid ones are
    /// rejected here as well.
    pub fn resolve(config: &Config, robots: &dyn RobotsPolicy) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;
        let seed = crawler
            .seed
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("a seed URL is required".to_string()))?;
        let scope_netloc = canonicalize(seed, crawler.ignore_queries)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL: {}", e)))?
            .authority()
            .to_string();
        let user_agent = config.effective_user_agent();

        let declared_rate = robots
            .request_rate(&user_agent)
            .filter(|rate| rate.requests > 0 && !rate.per.is_zero())
            .map(|rate| (rate.requests, rate.per.min(MAX_PER_UNIT)));
        let declared_delay = robots
            .crawl_delay(&user_agent)
            .filter(|delay| delay.is_finite() && *delay > 0.0)
            .map(|delay| {
                Duration::try_from_secs_f64(delay).map_or(MAX_PER_UNIT, |d| d.min(MAX_PER_UNIT))
            });

        let (tasks_per, per_unit, rate_source) = match (declared_rate, declared_delay) {
            (Some((requests, per)), _) => (requests, per, RateSource::RequestRate),
            (None, Some(delay)) => (1, delay, RateSource::CrawlDelay),
            (None, None) => (
                crawler.tasks_per,
                crawler.per_unit_duration()?,
                RateSource::Defaults,
            ),
        };

        let policy = Self {
            user_agent,
            tasks_per,
            per_unit,
            ignore_queries: crawler.ignore_queries,
            scope_netloc,
            scope_mode: crawler.scope,
            rate_source,
        };
        // Reject a limiter that could never or always block
        policy.rate_limiter()?;
        Ok(policy)
    }

    /// Builds a fresh rate limiter for this policy
    pub fn rate_limiter(&self) -> Result<RateLimiter, ConfigError> {
        RateLimiter::new(self.tasks_per, self.per_unit)
    }
}
