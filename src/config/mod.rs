//! Configuration module for jsripple
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags before validation.
//!
//! # Example
//!
//! ```no_run
//! use jsripple::config::{load_config, validate};
//! use std::path::Path;
//!
//! let mut config = load_config(Path::new("jsripple.toml")).unwrap();
//! config.crawl.workers = 8;
//! validate(&config).unwrap();
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    parse_duration, Config, CrawlConfig, ExtractConfig, FetchConfig, HeaderEntry, TaggingConfig,
    DEFAULT_DENYLIST, DEFAULT_SCRIPT_EXTENSIONS, DEFAULT_TIMEOUT_SECS,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
