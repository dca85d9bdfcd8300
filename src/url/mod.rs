//! URL handling module
//!
//! This module provides URL canonicalization for deduplication, authority
//! extraction and the authority-based scope check used to keep a crawl on a
//! single site.

mod canonicalize;
mod domain;

// Re-export main functions
pub use canonicalize::{canonicalize, CanonicalUrl};
pub use domain::{authority_in_scope, extract_authority, ScopeMode};
