use serde::Deserialize;
use url::{Position, Url};

/// How strictly a candidate authority must match the seed authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Either authority may be a plain string suffix of the other.
    ///
    /// This admits `blog.example.com` for seed `example.com` and the reverse,
    /// but also `notexample.com` for seed `example.com`.
    #[default]
    Suffix,

    /// Equal authorities, or one is a dot-separated subdomain of the other.
    Subdomain,
}

/// Extracts the authority (`userinfo@host:port`) of a URL
///
/// Hosts are lowercased by the URL parser; default ports are dropped.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use polite_crawler::url::extract_authority;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_authority(&url), Some("example.com:8080".to_string()));
///
/// let url = Url::parse("https://example.com:443/path").unwrap();
/// assert_eq!(extract_authority(&url), Some("example.com".to_string()));
/// ```
pub fn extract_authority(url: &Url) -> Option<String> {
    if !url.has_host() {
        return None;
    }
    let authority = &url[Position::BeforeUsername..Position::AfterPort];
    (!authority.is_empty()).then(|| authority.to_string())
}

/// Checks whether `candidate` falls inside the crawl scope of `seed`
///
/// # Examples
///
/// ```
/// use polite_crawler::url::{authority_in_scope, ScopeMode};
///
/// assert!(authority_in_scope("example.com", "blog.example.com", ScopeMode::Suffix));
/// assert!(authority_in_scope("blog.example.com", "example.com", ScopeMode::Suffix));
/// assert!(authority_in_scope("example.com", "notexample.com", ScopeMode::Suffix));
/// assert!(!authority_in_scope("example.com", "notexample.com", ScopeMode::Subdomain));
/// ```
pub fn authority_in_scope(seed: &str, candidate: &str, mode: ScopeMode) -> bool {
    if seed == candidate {
        return true;
    }

    match mode {
        ScopeMode::Suffix => seed.ends_with(candidate) || candidate.ends_with(seed),
        ScopeMode::Subdomain => is_subdomain(candidate, seed) || is_subdomain(seed, candidate),
    }
}

fn is_subdomain(child: &str, parent: &str) -> bool {
    child
        .strip_suffix(parent)
        .map_or(false, |prefix| prefix.ends_with('.'))
}
