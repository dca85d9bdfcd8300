//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests, following redirects
//! - Content-Type checks so only HTML bodies are parsed
//! - Classifying failures as transient or permanent

use crate::config::FetchConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Fetched an HTML page
    Success {
        /// Final URL after redirects, used as the base for relative links
        final_url: String,
        status_code: u16,
        body: String,
    },

    /// The response was not HTML and yields no links
    NotHtml {
        status_code: u16,
        content_type: String,
    },

    /// The server answered with a non-success status
    HttpError {
        status_code: u16,
        /// 429 and 5xx may succeed later
        transient: bool,
    },

    /// No usable response (connection refused, timeout, bad body, ...)
    NetworkError {
        error: String,
        /// Timeouts and connection failures may succeed later
        transient: bool,
    },
}

impl FetchResult {
    /// Whether a later attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { transient, .. } | Self::NetworkError { transient, .. } => *transient,
            Self::Success { .. } | Self::NotHtml { .. } => false,
        }
    }

    /// The HTTP status, if a response was received
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. }
            | Self::NotHtml { status_code, .. }
            | Self::HttpError { status_code, .. } => Some(*status_code),
            Self::NetworkError { .. } => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Timeouts for each request
/// * `user_agent` - Sent as the `User-Agent` header on every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use polite_crawler::config::FetchConfig;
/// use polite_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default(), "PoliteCrawler/1.0").unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig, user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the outcome
///
/// # Outcomes
///
/// | Condition | Result | Transient |
/// |-----------|--------|-----------|
/// | 2xx with HTML or no Content-Type | Success | - |
/// | 2xx with another Content-Type | NotHtml | - |
/// | HTTP 429, 5xx | HttpError | yes |
/// | Other 4xx, 3xx left unresolved | HttpError | no |
/// | Timeout, connection failure | NetworkError | yes |
/// | Anything else | NetworkError | no |
///
/// Never fails outright: every error becomes a [`FetchResult`] so one bad
/// page cannot abort the crawl.
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            transient: is_transient_status(status),
        };
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return FetchResult::NotHtml {
            status_code: status.as_u16(),
            content_type,
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            body,
        },
        Err(e) => classify_error(&e),
    }
}

fn classify_error(error: &reqwest::Error) -> FetchResult {
    if error.is_timeout() {
        FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            transient: true,
        }
    } else if error.is_connect() {
        FetchResult::NetworkError {
            error: format!("Connection failed: {}", error),
            transient: true,
        }
    } else {
        FetchResult::NetworkError {
            error: error.to_string(),
            transient: false,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// A missing Content-Type is parsed as HTML
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}
