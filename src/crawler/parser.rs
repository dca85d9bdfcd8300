//! Hyperlink extraction from fetched HTML
//!
//! Follows `<a href>` and `<link rel="canonical">`. A `<base href>` in the
//! document replaces the page URL as the base for relative links.

use scraper::{Html, Selector};
use url::Url;

/// Extracts the absolute http(s) links found in `html`
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document, `rel="nofollow"` included
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links (`#section`)
/// - Anything that does not resolve to http or https
///
/// Links are returned in document order, duplicates included; the frontier
/// decides what is new.
///
/// # Example
///
/// ```
/// use polite_crawler::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// assert_eq!(extract_links(html, &base), vec!["https://example.com/page"]);
/// ```
pub fn extract_links(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);
    let mut links = Vec::new();

    if let Ok(anchor) = Selector::parse("a[href]") {
        for element in document.select(&anchor) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, &base)) {
                links.push(link);
            }
        }
    }

    if let Ok(canonical) = Selector::parse("link[rel='canonical'][href]") {
        links.extend(
            document
                .select(&canonical)
                .filter_map(|element| element.value().attr("href"))
                .filter_map(|href| resolve_link(href, &base)),
        );
    }

    links
}

/// The first `<base href>`, resolved against the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .filter(|base| matches!(base.scheme(), "http" | "https"))
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves an href to an absolute http(s) URL, or `None` if it is skipped
fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    base.join(href)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
}
