//! jsripple: concurrent JavaScript endpoint discovery
//!
//! This crate fetches pages and scripts, pulls endpoint-like string literals
//! out of their source, and can follow newly discovered script and sitemap
//! references through a bounded pool of workers.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod input;
pub mod output;
pub mod state;
pub mod tagging;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for jsripple operations
#[derive(Debug, Error)]
pub enum JsRippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch {url}: {source}")]
    Fetch { url: String, source: FetchError },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid regular expression: {0}")]
    InvalidPattern(String),
}

/// Broad class of a fetch failure
///
/// The crawl orchestrator decides between skipping a resource and aborting
/// the whole run based on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Deadline exceeded, either reported by the transport or by our own timer
    Timeout,
    /// DNS failure, refused connection or unreachable network
    Network,
    /// Anything else
    Other,
}

/// Errors produced while obtaining the content of a target
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("failed to decode {encoding} response body: {source}")]
    Decode {
        encoding: String,
        source: std::io::Error,
    },

    #[error("failed to read local file {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid target URL: {0}")]
    InvalidUrl(String),

    #[error("could not build HTTP client: {0}")]
    Client(String),

    #[error("render backend failed: {0}")]
    Render(String),
}

impl FetchError {
    /// Returns the classification used by the orchestrator's failure policy
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Timeout(_) => FetchErrorKind::Timeout,
            Self::Network(_) => FetchErrorKind::Network,
            _ => FetchErrorKind::Other,
        }
    }

    /// Builds a timeout error for a deadline we enforced ourselves
    pub fn deadline(timeout: Duration) -> Self {
        Self::Timeout(format!("no response within {:?}", timeout))
    }
}

/// Errors raised while turning user input into crawl targets
#[derive(Debug, Error)]
pub enum InputError {
    #[error("at least one input is required")]
    Empty,

    #[error("burp mode requires a file input, got {0}")]
    BurpRequiresFile(String),

    #[error("input with wildcard does not match any files: {0}")]
    NoWildcardMatches(String),

    #[error("file could not be found (maybe you forgot to add http/https): {0}")]
    NotFound(String),

    #[error("malformed Burp export: {0}")]
    Burp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading tagging rules
#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("rule directory not found at {0}")]
    MissingDirectory(String),

    #[error("rule {name} not found in {dir}")]
    MissingRule { name: String, dir: String },

    #[error("no tagging rules found in {0}")]
    NoRules(String),

    #[error("unable to parse rule {name}: {message}")]
    Parse { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for jsripple operations
pub type Result<T> = std::result::Result<T, JsRippleError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOrchestrator, CrawlOutcome, Depth, ResourceTask, Target};
pub use extract::{find_endpoints, Endpoint};
pub use output::{Metadata, ResourceReport};
pub use state::{TaskState, VisitedSet};
pub use crate::url::{resolve_url, within_scope, ResourceType};
