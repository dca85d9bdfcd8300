use crate::UrlError;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use super::extract_authority;
use url::Url;

/// A URL in its canonical, comparison-ready form
///
/// Two raw URLs that denote the same resource for the crawler (differing only
/// by fragment, trailing slash, repeated slashes or, optionally, query)
/// produce equal `CanonicalUrl`s. Equality and hashing only look at the
/// serialized form, so a `HashSet<CanonicalUrl>` can be queried with `&str`.
#[derive(Debug, Clone)]
pub struct CanonicalUrl {
    value: String,
    authority: String,
}

impl CanonicalUrl {
    /// The full canonical serialization
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The authority component (`userinfo@host:port`) used for scoping
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Borrow<str> for CanonicalUrl {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Canonicalizes a URL for deduplication
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject it if it has no authority
/// 2. Drop the fragment
/// 3. Drop the query when `ignore_query` is set; an empty query is always dropped
/// 4. Split the `;params` segment off the last path segment
/// 5. Collapse runs of `/` in the path, then strip one trailing `/`
/// 6. Reassemble as `scheme://authority<path><;params><?query>`
///
/// No default `/` path is ever substituted, so `http://host/` and
/// `http://host` canonicalize identically. The only exception is a URL whose
/// path is empty but which carries `;params`: it keeps a single `/` so the
/// parameters cannot be mistaken for part of the host on re-parse.
///
/// # Examples
///
/// ```
/// use polite_crawler::url::canonicalize;
///
/// let url = canonicalize("http://www.domain.com/?query=value#fragment", false).unwrap();
/// assert_eq!(url.as_str(), "http://www.domain.com?query=value");
///
/// let url = canonicalize("http://www.domain.com/?query=value#fragment", true).unwrap();
/// assert_eq!(url.as_str(), "http://www.domain.com");
/// ```
pub fn canonicalize(raw: &str, ignore_query: bool) -> Result<CanonicalUrl, UrlError> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    let authority = url
        .host_str()
        .filter(|host| !host.is_empty())
        .and_then(|_| extract_authority(&url))
        .ok_or_else(|| UrlError::MissingAuthority(raw.to_string()))?;
    let (path, params) = split_params(url.path());
    let mut path = collapse_slashes(path);
    if path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() && params.is_some() {
        path.push('/');
    }

    let mut value = format!("{}://{}{}", url.scheme(), authority, path);
    if let Some(params) = params {
        value.push(';');
        value.push_str(params);
    }
    if !ignore_query {
        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            value.push('?');
            value.push_str(query);
        }
    }

    Ok(CanonicalUrl { value, authority })
}

/// Splits `;params` off the last segment of a path
///
/// Only a `;` after the final `/` starts the parameter string; the split
/// happens at the first `;` in that segment.
fn split_params(path: &str) -> (&str, Option<&str>) {
    let last_segment = path.rfind('/').map_or(0, |i| i + 1);
    match path[last_segment..].find(';') {
        Some(offset) => {
            let at = last_segment + offset;
            let params = &path[at + 1..];
            (&path[..at], (!params.is_empty()).then_some(params))
        }
        None => (path, None),
    }
}

/// Collapses every run of two or more `/` into one
fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}
