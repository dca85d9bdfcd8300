use crate::crawler::MAX_PER_UNIT;
use crate::url::ScopeMode;
use crate::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// The user agent as matched against robots.txt groups
    ///
    /// An empty agent string stands for every agent.
    pub fn effective_user_agent(&self) -> String {
        let agent = self.crawler.user_agent.trim();
        if agent.is_empty() {
            "*".to_string()
        } else {
            agent.to_string()
        }
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CrawlerConfig {
    /// URL the crawl starts from; may instead be given on the command line
    pub seed: Option<String>,

    /// Identifies the crawler to servers and to robots.txt
    pub user_agent: String,

    /// Location of the robots file, resolved against the seed.
    /// Empty disables robots handling entirely.
    pub robots_file: String,

    /// Maximum task starts within any `per-unit` window
    pub tasks_per: u32,

    /// Window length in seconds
    pub per_unit: f64,

    /// Drop query strings during canonicalization
    pub ignore_queries: bool,

    /// Number of concurrent fetch workers
    pub workers: usize,

    /// How discovered authorities are matched against the seed
    pub scope: ScopeMode,

    /// Re-queue a URL once after a timeout, connection failure, 429 or 5xx
    pub retry_transient: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            user_agent: format!("polite-crawler/{}", env!("CARGO_PKG_VERSION")),
            robots_file: "robots.txt".to_string(),
            tasks_per: 1,
            per_unit: 1.0,
            ignore_queries: false,
            workers: 1,
            scope: ScopeMode::default(),
            retry_transient: false,
        }
    }
}

impl CrawlerConfig {
    /// The rate window as a [`Duration`]
    pub fn per_unit_duration(&self) -> Result<Duration, ConfigError> {
        if !(self.per_unit.is_finite() && self.per_unit > 0.0) {
            return Err(ConfigError::Validation(format!(
                "per-unit must be a positive number of seconds, got {}",
                self.per_unit
            )));
        }
        match Duration::try_from_secs_f64(self.per_unit) {
            Ok(per_unit) if per_unit <= MAX_PER_UNIT => Ok(per_unit),
            _ => Err(ConfigError::Validation(format!(
                "per-unit must be at most {} seconds, got {}",
                MAX_PER_UNIT.as_secs(),
                self.per_unit
            ))),
        }
    }

    /// The robots file location, unless robots handling is disabled
    pub fn robots_file(&self) -> Option<&str> {
        let file = self.robots_file.trim();
        (!file.is_empty()).then_some(file)
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Values supplied on the command line, applied over the file
///
/// `None` leaves the file value alone. Boolean switches can only turn a
/// setting on.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub seed: Option<String>,
    pub user_agent: Option<String>,
    pub robots_file: Option<String>,
    pub no_robots: bool,
    pub tasks_per: Option<u32>,
    pub per_unit: Option<f64>,
    pub ignore_queries: bool,
    pub workers: Option<usize>,
    pub scope: Option<ScopeMode>,
    pub retry_transient: bool,
}

impl ConfigOverrides {
    /// Applies these overrides to `config`
    pub fn apply(self, config: &mut Config) {
        let crawler = &mut config.crawler;
        if let Some(seed) = self.seed {
            crawler.seed = Some(seed);
        }
        if let Some(user_agent) = self.user_agent {
            crawler.user_agent = user_agent;
        }
        if let Some(robots_file) = self.robots_file {
            crawler.robots_file = robots_file;
        }
        if self.no_robots {
            crawler.robots_file.clear();
        }
        if let Some(tasks_per) = self.tasks_per {
            crawler.tasks_per = tasks_per;
        }
        if let Some(per_unit) = self.per_unit {
            crawler.per_unit = per_unit;
        }
        if let Some(workers) = self.workers {
            crawler.workers = workers;
        }
        if let Some(scope) = self.scope {
            crawler.scope = scope;
        }
        crawler.ignore_queries |= self.ignore_queries;
        crawler.retry_transient |= self.retry_transient;
    }
}
