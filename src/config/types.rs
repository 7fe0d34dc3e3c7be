use crate::crawler::Depth;
use crate::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Script extensions followed during recursive discovery unless configured
pub const DEFAULT_SCRIPT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".jsx", ".ts", ".tsx"];

/// Path segments that are never followed
pub const DEFAULT_DENYLIST: &[&str] = &["node_modules", "jquery.js"];

/// Main configuration structure for jsripple
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URLs, files, wildcards or Burp exports to analyse
    pub inputs: Vec<String>,

    /// Treat every input as a Burp Suite XML export
    pub burp: bool,

    pub crawl: CrawlConfig,
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
    pub tagging: TaggingConfig,
}

/// Recursive discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Follow script and sitemap references found in fetched resources
    pub recursive: bool,

    /// Maximum recursion depth (0 means unlimited)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of concurrent workers
    pub workers: usize,

    /// Hostname boundary for recursive fetches
    pub scope: Option<String>,

    /// Also accept subdomains of the scope host
    #[serde(rename = "scope-include-subdomains")]
    pub scope_include_subdomains: bool,

    /// File extensions considered JavaScript
    #[serde(rename = "script-extensions")]
    pub script_extensions: Vec<String>,

    /// Path segments that disqualify a candidate
    pub denylist: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: 0,
            workers: default_workers(),
            scope: None,
            scope_include_subdomains: false,
            script_extensions: DEFAULT_SCRIPT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CrawlConfig {
    /// Initial depth carried by seed tasks
    pub fn depth(&self) -> Depth {
        Depth::from_max_depth(self.max_depth)
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds; fractions are allowed
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: f64,

    /// Proxy URL applied to every request
    pub proxy: Option<String>,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// Raw Cookie header value
    pub cookies: Option<String>,

    /// Fetch through the browser rendering backend instead of plain HTTP
    pub render: bool,

    /// Extra request headers, overriding the defaults by name
    pub headers: Vec<HeaderEntry>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS as f64,
            proxy: None,
            insecure: false,
            cookies: None,
            render: false,
            headers: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// The timeout as a duration; unusable values fall back to the default
    pub fn timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Parses a timeout given as plain seconds or with a unit
///
/// Accepts `10`, `2.5`, `10s`, `500ms` and `1m`.
///
/// # Examples
///
/// ```
/// use jsripple::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
/// ```
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::Validation(format!("invalid duration {:?}", raw));

    let (number, scale) = if let Some(ms) = raw.strip_suffix("ms") {
        (ms, 0.001)
    } else if let Some(secs) = raw.strip_suffix('s') {
        (secs, 1.0)
    } else if let Some(mins) = raw.strip_suffix('m') {
        (mins, 60.0)
    } else {
        (raw, 1.0)
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    let duration = Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())?;
    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}

/// A single custom request header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    /// Parses a `Name: value` pair as given on the command line
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, value) = raw.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// Endpoint extraction configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Only report endpoints matching this regular expression
    pub regex: Option<String>,

    /// Capture the surrounding source line for every endpoint
    pub context: bool,
}

impl ExtractConfig {
    /// Compiles the filter expression, if any
    pub fn compile_filter(&self) -> Result<Option<Regex>, ConfigError> {
        match self.regex.as_deref() {
            None | Some("") => Ok(None),
            Some(pattern) => Regex::new(pattern)
                .map(Some)
                .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e))),
        }
    }
}

/// Tagging rule configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Rule names to load, or `all`
    pub rules: Vec<String>,

    /// Directory holding the rule files (defaults to `~/.gf`)
    pub dir: Option<String>,
}

impl TaggingConfig {
    pub fn is_enabled(&self) -> bool {
        !self.rules.is_empty()
    }

    /// True when every rule in the directory should be loaded
    pub fn use_all(&self) -> bool {
        self.rules.iter().any(|r| r.eq_ignore_ascii_case("all"))
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
