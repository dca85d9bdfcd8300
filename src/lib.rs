//! Polite Crawler: a single-domain web crawler
//!
//! This crate discovers and visits the hyperlinks of one site, starting from a
//! seed URL, while respecting the site's robots.txt rules and declared crawl
//! rate. The crawl state machine lives in [`crawler`]: URL canonicalization,
//! visitation bookkeeping, scope/robots filtering and a sliding-window rate
//! limiter that paces outbound requests.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Robots.txt error: {0}")]
    Robots(String),

    #[error("Crawl worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
///
/// Raised when a URL cannot be split into scheme, authority and path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing authority in URL: {0}")]
    MissingAuthority(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::crawler::{CrawlEngine, CrawlFrontier, CrawlReport, Policy, RateLimiter};
pub use crate::url::{canonicalize, CanonicalUrl};
