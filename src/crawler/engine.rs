//! Crawl engine - drives the fetch loop over the frontier
//!
//! The engine owns the frontier and rate limiter and runs a pool of workers
//! over them:
//! - Each worker dequeues a URL, waits for rate-limit capacity, fetches the
//!   page and offers every extracted link back to the frontier
//! - The crawl ends when the queue is empty and no task is in flight
//! - A [`ShutdownHandle`] stops new work; in-flight fetches still finish
//!
//! With a single worker the crawl is strictly sequential: one URL is
//! dequeued, fetched and processed before the next.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::parser::extract_links;
use crate::crawler::{CrawlFrontier, Policy, ScopeFilter, SharedRateLimiter};
use crate::output::{CrawlEvent, CrawlStatistics, EventSink, StatsRecorder};
use crate::robots::{load_robots, robots_url, ParsedRobots, RobotsPolicy};
use crate::url::CanonicalUrl;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinSet;
use url::Url;

/// Outcome of a finished (or interrupted) crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub seed: String,
    /// Every URL accepted into the frontier, sorted
    pub visited: Vec<String>,
    pub stats: CrawlStatistics,
    pub policy: Policy,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True if shutdown was requested during the crawl
    pub interrupted: bool,
}

/// Requests a graceful stop of a running crawl
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    sink: Arc<dyn EventSink>,
}

impl ShutdownHandle {
    /// Stops dequeuing new work and abandons rate-limit waits
    ///
    /// Safe to call more than once; only the first call is reported.
    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            self.sink.emit(&CrawlEvent::ShutdownRequested);
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Main crawl engine
pub struct CrawlEngine {
    client: Client,
    policy: Policy,
    seed: String,
    workers: usize,
    retry_transient: bool,
    frontier: CrawlFrontier,
    limiter: SharedRateLimiter,
    sink: Arc<dyn EventSink>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl CrawlEngine {
    /// Builds an engine from a validated configuration
    ///
    /// This fetches the site's robots file (unless disabled) and resolves
    /// the crawl policy from it, so it performs network I/O.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Ready to [`run`](Self::run)
    /// * `Err(CrawlError)` - Invalid configuration or HTTP client setup failure
    ///
    /// An unreachable robots file is not an error; see
    /// [`crate::robots::load_robots`].
    pub async fn from_config(config: &Config, sink: Arc<dyn EventSink>) -> Result<Self, CrawlError> {
        crate::config::validate(config)?;

        let seed = config.crawler.seed.clone().unwrap_or_default();
        let seed_url = Url::parse(&seed)
            .map_err(|e| crate::UrlError::Parse(format!("{}: {}", seed, e)))?;
        let client = build_http_client(&config.fetch, &config.crawler.user_agent)?;

        let robots = match config.crawler.robots_file() {
            Some(file) => {
                let location = robots_url(&seed_url, file)?;
                tracing::debug!("Fetching robots policy from {}", location);
                load_robots(&client, &location, &config.crawler.user_agent, sink.as_ref()).await
            }
            None => {
                tracing::debug!("Robots handling disabled");
                ParsedRobots::allow_all()
            }
        };

        let policy = Policy::resolve(config, &robots)?;
        tracing::debug!("Resolved crawl policy: {:?}", policy);

        Ok(Self::with_parts(client, policy, Arc::new(robots), &seed, sink)?
            .workers(config.crawler.workers)
            .retry_transient(config.crawler.retry_transient))
    }

    /// Builds an engine from already-resolved parts
    ///
    /// Starts with one worker and no retries.
    pub fn with_parts(
        client: Client,
        policy: Policy,
        robots: Arc<dyn RobotsPolicy>,
        seed: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, CrawlError> {
        let filter = ScopeFilter::new(
            policy.scope_netloc.clone(),
            policy.scope_mode,
            policy.user_agent.clone(),
            robots,
        );
        let frontier = CrawlFrontier::new(seed, policy.ignore_queries, filter, sink.clone())?;
        let limiter = SharedRateLimiter::new(policy.rate_limiter()?);
        let (tx, _rx) = watch::channel(false);

        Ok(Self {
            client,
            policy,
            seed: seed.to_string(),
            workers: 1,
            retry_transient: false,
            frontier,
            limiter,
            sink,
            shutdown: Arc::new(tx),
        })
    }

    /// Sets the number of concurrent workers (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Enables a single deferred re-attempt after a transient failure
    pub fn retry_transient(mut self, enabled: bool) -> Self {
        self.retry_transient = enabled;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn frontier(&self) -> &CrawlFrontier {
        &self.frontier
    }

    /// A handle that can stop this crawl from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
            sink: self.sink.clone(),
        }
    }

    /// Runs the crawl until the frontier is exhausted or shutdown is requested
    pub async fn run(self) -> Result<CrawlReport, CrawlError> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.sink.emit(&CrawlEvent::CrawlStarted {
            seed: self.seed.clone(),
            user_agent: self.policy.user_agent.clone(),
            tasks_per: self.policy.tasks_per,
            per_unit: self.policy.per_unit,
            ignore_queries: self.policy.ignore_queries,
            workers: self.workers,
        });

        let shared = Arc::new(Shared {
            frontier: Mutex::new(self.frontier),
            limiter: self.limiter,
            client: self.client,
            sink: self.sink.clone(),
            stats: StatsRecorder::default(),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            retry_transient: self.retry_transient,
        });

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            let shared = shared.clone();
            let shutdown = self.shutdown.subscribe();
            workers.spawn(async move { shared.work(shutdown).await });
        }
        while let Some(joined) = workers.join_next().await {
            joined?;
        }

        let frontier = shared.frontier.lock().await;
        let visited = frontier.visited_urls();
        let stats = shared.stats.snapshot(
            frontier.visited_count(),
            frontier.rejections().clone(),
            frontier.malformed_count(),
        );
        drop(frontier);
        let interrupted = *self.shutdown.borrow();

        self.sink.emit(&CrawlEvent::CrawlFinished {
            visited: visited.len(),
            elapsed: start.elapsed(),
        });

        Ok(CrawlReport {
            seed: self.seed,
            visited,
            stats,
            policy: self.policy,
            started_at,
            finished_at: Utc::now(),
            interrupted,
        })
    }
}

/// State shared by all workers of one run
struct Shared {
    frontier: Mutex<CrawlFrontier>,
    limiter: SharedRateLimiter,
    client: Client,
    sink: Arc<dyn EventSink>,
    stats: StatsRecorder,
    /// Tasks dequeued but not yet finished
    in_flight: AtomicUsize,
    /// Signalled whenever a task finishes
    idle: Notify,
    retry_transient: bool,
}

impl Shared {
    async fn work(&self, mut shutdown: watch::Receiver<bool>) {
        while let Some(url) = self.next_url(&mut shutdown).await {
            self.crawl_one(url, &mut shutdown).await;
        }
    }

    /// Dequeues the next URL, waiting while other tasks may still add links
    ///
    /// Returns `None` once the queue is empty with nothing in flight, or on
    /// shutdown.
    async fn next_url(&self, shutdown: &mut watch::Receiver<bool>) -> Option<CanonicalUrl> {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            // Register for the wakeup before looking, so a task finishing in
            // between is not missed
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            {
                let mut frontier = self.frontier.lock().await;
                if let Some(url) = frontier.visit_next() {
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    self.sink.emit(&CrawlEvent::QueueDepth {
                        remaining: frontier.remaining_count(),
                    });
                    return Some(url);
                }
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    drop(frontier);
                    self.idle.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = &mut idle => {}
                _ = shutdown.wait_for(|stop| *stop) => return None,
            }
        }
    }

    async fn crawl_one(&self, url: CanonicalUrl, shutdown: &mut watch::Receiver<bool>) {
        let waited = match self.limiter.acquire(url.as_str(), shutdown, self.sink.as_ref()).await {
            Some(waited) => waited,
            None => return self.finish(url, &[], false).await,
        };
        if waited > Duration::ZERO {
            self.stats.record_wait(waited);
        }

        self.sink.emit(&CrawlEvent::TaskStarted {
            url: url.to_string(),
        });
        let started = Instant::now();

        let result = fetch_url(&self.client, url.as_str()).await;
        match result {
            FetchResult::Success {
                final_url,
                status_code,
                body,
            } => {
                let links = page_links(&body, &final_url, url.as_str());
                self.stats.record_fetched();
                self.sink.emit(&CrawlEvent::TaskFinished {
                    url: url.to_string(),
                    status: status_code,
                    links: links.len(),
                    elapsed: started.elapsed(),
                });
                self.finish(url, &links, false).await;
            }
            FetchResult::NotHtml { content_type, .. } => {
                self.stats.record_not_html();
                self.sink.emit(&CrawlEvent::NotHtml {
                    url: url.to_string(),
                    content_type,
                });
                self.finish(url, &[], false).await;
            }
            failure => {
                self.stats.record_failed();
                self.sink.emit(&CrawlEvent::FetchFailed {
                    url: url.to_string(),
                    status: failure.status_code(),
                    cause: failure_cause(&failure),
                });
                let retry = self.retry_transient && failure.is_transient();
                self.finish(url, &[], retry).await;
            }
        }
    }

    /// Offers discovered links, optionally defers a retry, and retires the task
    async fn finish(&self, url: CanonicalUrl, links: &[String], retry: bool) {
        let mut frontier = self.frontier.lock().await;
        for link in links {
            frontier.offer(link);
        }
        if retry {
            let display = url.to_string();
            if frontier.defer(url) {
                self.stats.record_retry();
                self.sink.emit(&CrawlEvent::RetryDeferred { url: display });
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        drop(frontier);
        self.idle.notify_waiters();
    }
}

/// Extracts links, resolving against the post-redirect URL
fn page_links(body: &str, final_url: &str, requested: &str) -> Vec<String> {
    match Url::parse(final_url).or_else(|_| Url::parse(requested)) {
        Ok(base) => extract_links(body, &base),
        Err(e) => {
            tracing::debug!("No usable base URL for {}: {}", requested, e);
            Vec::new()
        }
    }
}

fn failure_cause(result: &FetchResult) -> String {
    match result {
        FetchResult::HttpError { status_code, .. } => format!("HTTP {}", status_code),
        FetchResult::NetworkError { error, .. } => error.clone(),
        FetchResult::Success { .. } | FetchResult::NotHtml { .. } => String::new(),
    }
}
