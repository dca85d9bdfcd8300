//! Robots.txt parser implementation
//!
//! Allow/deny matching is delegated to the robotstxt crate. Rate directives
//! (`Crawl-delay`, `Request-rate`) are not covered by that crate and are read
//! here from the user-agent group that applies to the crawler.

use super::{RequestRate, RobotsPolicy};
use robotstxt::DefaultMatcher;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Evaluate the stored rules
    Rules,
    AllowAll,
    DisallowAll,
}

/// Rate directives declared by one user-agent group
#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
    request_rate: Option<RequestRate>,
}

impl Group {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|agent| agent == "*")
    }

    fn applies_to(&self, token: &str) -> bool {
        self.agents
            .iter()
            .any(|agent| !agent.is_empty() && agent != "*" && token.contains(agent.as_str()))
    }
}

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    access: Access,
    groups: Vec<Group>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            access: Access::Rules,
            groups: parse_groups(content),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is the fallback when robots.txt is missing or unreachable.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            access: Access::AllowAll,
            groups: Vec::new(),
        }
    }

    /// Creates a ParsedRobots that denies everything
    ///
    /// Used when the robots file answers 401 or 403.
    pub fn disallow_all() -> Self {
        Self {
            content: String::new(),
            access: Access::DisallowAll,
            groups: Vec::new(),
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The full user agent string
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.access {
            Access::AllowAll => true,
            Access::DisallowAll => false,
            Access::Rules if self.content.trim().is_empty() => true,
            Access::Rules => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(&self.content, product_token(user_agent), url)
            }
        }
    }

    /// Gets the crawl delay in seconds for a specific user agent
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.group_for(user_agent).and_then(|group| group.crawl_delay)
    }

    /// Gets the request rate for a specific user agent
    pub fn request_rate(&self, user_agent: &str) -> Option<RequestRate> {
        self.group_for(user_agent).and_then(|group| group.request_rate)
    }

    /// Finds the group governing `user_agent`
    ///
    /// The first group naming the agent wins; the `*` group is the fallback.
    /// A matching group without rate directives does not fall through to `*`.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let token = product_token(user_agent).to_lowercase();
        self.groups
            .iter()
            .find(|group| group.applies_to(&token))
            .or_else(|| self.groups.iter().find(|group| group.is_wildcard()))
    }
}

impl RobotsPolicy for ParsedRobots {
    fn can_fetch(&self, user_agent: &str, url: &str) -> bool {
        self.is_allowed(url, user_agent)
    }

    fn request_rate(&self, user_agent: &str) -> Option<RequestRate> {
        ParsedRobots::request_rate(self, user_agent)
    }

    fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        ParsedRobots::crawl_delay(self, user_agent)
    }
}

/// Returns the product token of a user agent (`MyBot/1.0 (+url)` -> `MyBot`)
pub fn product_token(user_agent: &str) -> &str {
    let trimmed = user_agent.trim();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(trimmed.len());
    if end == 0 {
        "*"
    } else {
        &trimmed[..end]
    }
}

/// Splits robots.txt content into user-agent groups
///
/// Consecutive `User-agent` lines share a group; the first `User-agent` line
/// after any other directive opens a new one.
fn parse_groups(content: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut current: Option<Group> = None;
    let mut in_agent_lines = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        if key == "user-agent" {
            if !in_agent_lines {
                groups.extend(current.take());
                current = Some(Group::default());
                in_agent_lines = true;
            }
            if let Some(group) = current.as_mut() {
                group.agents.push(value.to_lowercase());
            }
            continue;
        }

        in_agent_lines = false;
        let Some(group) = current.as_mut() else {
            continue;
        };
        match key.as_str() {
            "crawl-delay" => {
                if let Ok(delay) = value.parse::<f64>() {
                    if delay.is_finite() && delay >= 0.0 {
                        group.crawl_delay = Some(delay);
                    }
                }
            }
            "request-rate" => {
                if let Some(rate) = parse_request_rate(value) {
                    group.request_rate = Some(rate);
                }
            }
            _ => {}
        }
    }

    groups.extend(current);
    groups
}

/// Parses a `Request-rate` value such as `1/5`, `10/1m` or `3/2h`
fn parse_request_rate(value: &str) -> Option<RequestRate> {
    let (requests, per) = value.split_once('/')?;
    let requests = requests.trim().parse::<u32>().ok()?;

    let per = per.trim().to_lowercase();
    let (amount, unit_secs) = match per.chars().last()? {
        's' => (&per[..per.len() - 1], 1),
        'm' => (&per[..per.len() - 1], 60),
        'h' => (&per[..per.len() - 1], 3600),
        _ => (per.as_str(), 1),
    };
    let amount = amount.trim().parse::<u64>().ok()?;

    Some(RequestRate {
        requests,
        per: Duration::from_secs(amount.checked_mul(unit_secs)?),
    })
}
