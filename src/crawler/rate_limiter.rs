//! Sliding-window rate limiter pacing outbound requests
//!
//! At most `tasks_per` task starts may fall inside any trailing `per_unit`
//! window. This matches robots.txt `Request-rate: N/M` directly and models
//! `Crawl-delay: D` as one task per `D` seconds. There is no burst credit:
//! capacity only returns when the oldest start leaves the window.

use crate::output::{CrawlEvent, EventSink};
use crate::ConfigError;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

/// Longest window a limiter accepts
pub const MAX_PER_UNIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Window of recent task start times
///
/// The caller supplies the clock, which keeps every decision deterministic
/// and testable.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tasks_per: u32,
    per_unit: Duration,
    /// Start times in increasing order
    window: VecDeque<Instant>,
}

impl RateLimiter {
    /// Creates a limiter allowing `tasks_per` starts per `per_unit`
    ///
    /// A zero count or zero window would either never or always block, so
    /// both are rejected rather than clamped. Windows longer than
    /// [`MAX_PER_UNIT`] are rejected too.
    pub fn new(tasks_per: u32, per_unit: Duration) -> Result<Self, ConfigError> {
        if tasks_per == 0 {
            return Err(ConfigError::Validation(
                "tasks_per must be a positive integer".to_string(),
            ));
        }
        if per_unit.is_zero() {
            return Err(ConfigError::Validation(
                "per_unit must be a positive duration".to_string(),
            ));
        }
        if per_unit > MAX_PER_UNIT {
            return Err(ConfigError::Validation(format!(
                "per_unit must be at most {}s, got {}s",
                MAX_PER_UNIT.as_secs(),
                per_unit.as_secs_f64()
            )));
        }

        Ok(Self {
            tasks_per,
            per_unit,
            window: VecDeque::with_capacity(tasks_per as usize),
        })
    }

    pub fn tasks_per(&self) -> u32 {
        self.tasks_per
    }

    pub fn per_unit(&self) -> Duration {
        self.per_unit
    }

    /// Appends a task start to the window
    pub fn record_task_start(&mut self, now: Instant) {
        self.window.push_back(now);
    }

    /// Drops every start `t` with `now - t >= per_unit`
    pub fn evict_expired(&mut self, now: Instant) {
        while let Some(&oldest) = self.window.front() {
            if now.saturating_duration_since(oldest) >= self.per_unit {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a task may start at `now`
    pub fn has_capacity(&mut self, now: Instant) -> bool {
        self.evict_expired(now);
        self.window.len() < self.tasks_per as usize
    }

    /// Time until the oldest start leaves the window
    ///
    /// Zero when there is capacity already. After waiting this long,
    /// `has_capacity` is true unless other tasks started meanwhile.
    pub fn time_until_capacity(&mut self, now: Instant) -> Duration {
        if self.has_capacity(now) {
            return Duration::ZERO;
        }
        match self.window.front() {
            Some(&oldest) => oldest
                .checked_add(self.per_unit)
                .map_or(self.per_unit, |ready| ready.saturating_duration_since(now)),
            None => Duration::ZERO,
        }
    }

    /// Atomically checks capacity and records a start
    ///
    /// Returns `Ok(())` if the task was admitted, or the wait before it
    /// could be.
    pub fn try_start(&mut self, now: Instant) -> Result<(), Duration> {
        if self.has_capacity(now) {
            self.record_task_start(now);
            Ok(())
        } else {
            Err(self.time_until_capacity(now))
        }
    }

    /// Number of starts currently in the window
    pub fn in_window(&self) -> usize {
        self.window.len()
    }
}

/// A [`RateLimiter`] shared by concurrent workers
///
/// The evict/check/record sequence runs under one mutex, so two workers can
/// never both observe the last free slot.
#[derive(Debug)]
pub struct SharedRateLimiter {
    inner: Mutex<RateLimiter>,
}

impl SharedRateLimiter {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            inner: Mutex::new(limiter),
        }
    }

    /// Waits until a task may start for `url`, then records the start
    ///
    /// Loops rather than recursing: each pass evaluates capacity, sleeps for
    /// the computed duration and evaluates again. Returns the total time
    /// waited, or `None` if `shutdown` fired while waiting.
    pub async fn acquire(
        &self,
        url: &str,
        shutdown: &mut watch::Receiver<bool>,
        sink: &dyn EventSink,
    ) -> Option<Duration> {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut limiter = self.inner.lock().await;
                match limiter.try_start(Instant::now()) {
                    Ok(()) => return Some(waited),
                    Err(wait) => wait,
                }
            };

            sink.emit(&CrawlEvent::RateLimited {
                url: url.to_string(),
                wait,
            });

            tokio::select! {
                _ = tokio::time::sleep(wait) => waited += wait,
                _ = shutdown.wait_for(|stop| *stop) => return None,
            }
        }
    }

    /// Number of starts currently in the window
    pub async fn in_window(&self) -> usize {
        let mut limiter = self.inner.lock().await;
        limiter.evict_expired(Instant::now());
        limiter.in_window()
    }
}
