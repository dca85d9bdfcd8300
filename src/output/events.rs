//! Leveled crawl events and the sinks that consume them
//!
//! The crawl core never formats log lines itself. It emits [`CrawlEvent`]s,
//! each carrying its own [`Verbosity`], and an [`EventSink`] decides what to
//! do with them.

use crate::crawler::RejectReason;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Tracing target for rejection-detail events (verbosity 3)
pub const DETAIL_TARGET: &str = "polite_crawler::detail";

/// Verbosity level of an event; higher is chattier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    /// Crawl start/finish summaries
    Summary = 0,
    /// Per-task timing and rate-limit waits
    Task = 1,
    /// Queue depth and enqueue decisions
    Queue = 2,
    /// Rejection reasons
    Detail = 3,
}

/// Something that happened during a crawl
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    CrawlStarted {
        seed: String,
        user_agent: String,
        tasks_per: u32,
        per_unit: Duration,
        ignore_queries: bool,
        workers: usize,
    },
    PolicyUnavailable {
        robots_url: String,
        cause: String,
    },
    RateLimited {
        url: String,
        wait: Duration,
    },
    TaskStarted {
        url: String,
    },
    TaskFinished {
        url: String,
        status: u16,
        links: usize,
        elapsed: Duration,
    },
    NotHtml {
        url: String,
        content_type: String,
    },
    FetchFailed {
        url: String,
        status: Option<u16>,
        cause: String,
    },
    RetryDeferred {
        url: String,
    },
    QueueDepth {
        remaining: usize,
    },
    Enqueued {
        url: String,
    },
    Rejected {
        url: String,
        reason: RejectReason,
    },
    Malformed {
        raw: String,
        error: String,
    },
    ShutdownRequested,
    CrawlFinished {
        visited: usize,
        elapsed: Duration,
    },
}

impl CrawlEvent {
    /// The verbosity at which this event is reported
    pub fn level(&self) -> Verbosity {
        match self {
            Self::CrawlStarted { .. }
            | Self::PolicyUnavailable { .. }
            | Self::ShutdownRequested
            | Self::CrawlFinished { .. } => Verbosity::Summary,
            Self::RateLimited { .. }
            | Self::TaskStarted { .. }
            | Self::TaskFinished { .. }
            | Self::NotHtml { .. }
            | Self::FetchFailed { .. }
            | Self::RetryDeferred { .. } => Verbosity::Task,
            Self::QueueDepth { .. } | Self::Enqueued { .. } => Verbosity::Queue,
            Self::Rejected { .. } | Self::Malformed { .. } => Verbosity::Detail,
        }
    }

    /// The URL the event is about, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::CrawlStarted { seed, .. } => Some(seed),
            Self::PolicyUnavailable { robots_url, .. } => Some(robots_url),
            Self::RateLimited { url, .. }
            | Self::TaskStarted { url }
            | Self::TaskFinished { url, .. }
            | Self::NotHtml { url, .. }
            | Self::FetchFailed { url, .. }
            | Self::RetryDeferred { url }
            | Self::Enqueued { url }
            | Self::Rejected { url, .. } => Some(url),
            Self::Malformed { raw, .. } => Some(raw),
            Self::QueueDepth { .. } | Self::ShutdownRequested | Self::CrawlFinished { .. } => None,
        }
    }

    /// The rejection reason, for rejection events
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrawlStarted {
                seed,
                user_agent,
                tasks_per,
                per_unit,
                ignore_queries,
                workers,
            } => write!(
                f,
                "Crawling {} as '{}': {} task(s) per {:?}, ignore queries: {}, workers: {}",
                seed, user_agent, tasks_per, per_unit, ignore_queries, workers
            ),
            Self::PolicyUnavailable { robots_url, cause } => write!(
                f,
                "Robots policy {} unavailable ({}), allowing everything",
                robots_url, cause
            ),
            Self::RateLimited { url, wait } => write!(f, "Waiting {:?} before {}", wait, url),
            Self::TaskStarted { url } => write!(f, "Fetching {}", url),
            Self::TaskFinished {
                url,
                status,
                links,
                elapsed,
            } => write!(
                f,
                "Fetched {} (HTTP {}, {} links) in {:?}",
                url, status, links, elapsed
            ),
            Self::NotHtml { url, content_type } => {
                write!(f, "Skipping links of {}: content type '{}'", url, content_type)
            }
            Self::FetchFailed {
                url,
                status: Some(status),
                cause,
            } => write!(f, "Error {} while crawling {}: {}", status, url, cause),
            Self::FetchFailed {
                url,
                status: None,
                cause,
            } => write!(f, "Error while crawling {}: {}", url, cause),
            Self::RetryDeferred { url } => write!(f, "Deferring one more attempt at {}", url),
            Self::QueueDepth { remaining } => write!(f, "{} url(s) in queue", remaining),
            Self::Enqueued { url } => write!(f, "Adding {}", url),
            Self::Rejected { url, reason } => write!(f, "Skipping {} ({})", url, reason),
            Self::Malformed { raw, error } => write!(f, "Dropping malformed URL {}: {}", raw, error),
            Self::ShutdownRequested => write!(f, "Shutdown requested, draining in-flight tasks"),
            Self::CrawlFinished { visited, elapsed } => {
                write!(f, "Crawl finished: {} url(s) visited in {:?}", visited, elapsed)
            }
        }
    }
}

/// Consumer of crawl events
///
/// Any sink (console, file, no-op) implements this; the crawler holds it as
/// `Arc<dyn EventSink>` and shares it between workers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CrawlEvent);
}

/// Forwards events to `tracing`
///
/// Summary events log at `info`, task events at `debug`, queue events at
/// `trace`, rejection details at `trace` on [`DETAIL_TARGET`]. Fetch
/// failures and an unavailable robots policy log at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CrawlEvent) {
        let url = event.url().unwrap_or_default();
        match event {
            CrawlEvent::FetchFailed { .. } | CrawlEvent::PolicyUnavailable { .. } => {
                tracing::warn!(url, "{}", event)
            }
            CrawlEvent::Rejected { reason, .. } => {
                tracing::trace!(target: DETAIL_TARGET, url, reason = %reason, "{}", event)
            }
            _ => match event.level() {
                Verbosity::Summary => tracing::info!("{}", event),
                Verbosity::Task => tracing::debug!(url, "{}", event),
                Verbosity::Queue => tracing::trace!(url, "{}", event),
                Verbosity::Detail => tracing::trace!(target: DETAIL_TARGET, url, "{}", event),
            },
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &CrawlEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of all events received so far
    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events at or below `max` verbosity
    pub fn events_up_to(&self, max: Verbosity) -> Vec<CrawlEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level() <= max)
            .collect()
    }

    /// `(url, reason)` for every rejection received so far
    pub fn rejections(&self) -> Vec<(String, RejectReason)> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                CrawlEvent::Rejected { url, reason } => Some((url.clone(), *reason)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &CrawlEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
