use crate::config::types::{Config, CrawlerConfig, FetchConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on concurrent workers
const MAX_WORKERS: usize = 100;

/// Validates a complete configuration, ready to crawl
///
/// A seed URL is required here. Call this after command-line overrides
/// have been applied.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_settings(config)?;
    match config.crawler.seed.as_deref() {
        Some(seed) => validate_seed(seed),
        None => Err(ConfigError::Validation(
            "a seed URL is required (config `seed` or command line)".to_string(),
        )),
    }
}

/// Validates everything except the presence of a seed
///
/// A configuration file alone may leave the seed to the command line.
pub fn validate_settings(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    if let Some(seed) = config.crawler.seed.as_deref() {
        validate_seed(seed)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.tasks_per < 1 {
        return Err(ConfigError::Validation(format!(
            "tasks-per must be >= 1, got {}",
            config.tasks_per
        )));
    }

    config.per_unit_duration()?;

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    validate_user_agent(&config.user_agent)?;

    Ok(())
}

/// The agent is sent as a header, so it must be visible ASCII
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if !user_agent.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(ConfigError::Validation(format!(
            "user-agent must be printable ASCII, got '{}'",
            user_agent.escape_debug()
        )));
    }
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }
    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// The seed must be an absolute http(s) URL with a host
fn validate_seed(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed '{}': {}", seed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed '{}' has no host",
            seed
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: &str) -> Config {
        let mut config = Config::default();
        config.crawler.seed = Some(seed.to_string());
        config
    }

    #[test]
    fn test_validate_seed() {
        assert!(validate_seed("https://example.com/").is_ok());
        assert!(validate_seed("http://example.com:8080/start?x=1").is_ok());

        assert!(validate_seed("").is_err());
        assert!(validate_seed("example.com").is_err());
        assert!(validate_seed("ftp://example.com/").is_err());
        assert!(validate_seed("mailto:admin@example.com").is_err());
    }

    #[test]
    fn test_seed_required_only_for_full_validation() {
        let config = Config::default();
        assert!(validate_settings(&config).is_ok());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
        assert!(validate(&seeded("https://example.com/")).is_ok());
    }

    #[test]
    fn test_validate_crawler_bounds() {
        let mut config = seeded("https://example.com/");
        config.crawler.tasks_per = 0;
        assert!(validate(&config).is_err());

        let mut config = seeded("https://example.com/");
        config.crawler.per_unit = 0.0;
        assert!(validate(&config).is_err());
        config.crawler.per_unit = 1e19;
        assert!(validate(&config).is_err());

        let mut config = seeded("https://example.com/");
        config.crawler.workers = 0;
        assert!(validate(&config).is_err());
        config.crawler.workers = MAX_WORKERS + 1;
        assert!(validate(&config).is_err());
        config.crawler.workers = MAX_WORKERS;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_user_agent() {
        assert!(validate_user_agent("PoliteCrawler/1.0 (+https://example.com/bot)").is_ok());
        assert!(validate_user_agent("").is_ok());
        assert!(validate_user_agent("Bot\r\nX-Injected: 1").is_err());
        assert!(validate_user_agent("Bötchen").is_err());
    }

    #[test]
    fn test_validate_fetch_timeouts() {
        let mut config = seeded("https://example.com/");
        config.fetch.timeout_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = seeded("https://example.com/");
        config.fetch.connect_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }
}
