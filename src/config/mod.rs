//! Configuration module
//!
//! Loads the optional TOML configuration file, merges command-line
//! overrides and validates the result.
//!
//! # Example
//!
//! ```no_run
//! use polite_crawler::config::{load_config, validate, ConfigOverrides};
//! use std::path::Path;
//!
//! let mut config = load_config(Path::new("crawler.toml")).unwrap();
//! ConfigOverrides {
//!     seed: Some("https://example.com/".to_string()),
//!     ..Default::default()
//! }
//! .apply(&mut config);
//! validate(&config).unwrap();
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, ConfigOverrides, CrawlerConfig, FetchConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_settings};
