use crate::config::{DEFAULT_DENYLIST, DEFAULT_SCRIPT_EXTENSIONS};
use crate::url::normalize::strip_query_and_fragment;
use once_cell::sync::Lazy;
use std::fmt;
use url::Url;

static DEFAULT_RESOLVER: Lazy<ResourceResolver> = Lazy::new(ResourceResolver::default);

/// Kind of resource a discovered endpoint points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// A script file matching the configured extensions
    JavaScript,
    /// An XML document or anything named like a sitemap
    Sitemap,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JavaScript => write!(f, "javascript"),
            Self::Sitemap => write!(f, "sitemap"),
        }
    }
}

/// Decides which discovered endpoints are worth fetching and where they live
///
/// A resolver is built once per crawl from the configured script extensions
/// and denylist and is then shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    script_extensions: Vec<String>,
    denylist: Vec<String>,
}

impl Default for ResourceResolver {
    fn default() -> Self {
        let extensions: Vec<String> = DEFAULT_SCRIPT_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect();
        let denylist: Vec<String> = DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect();
        Self::new(&extensions, &denylist)
    }
}

impl ResourceResolver {
    /// Creates a resolver
    ///
    /// # Arguments
    ///
    /// * `extensions` - Script extensions, with or without the leading dot
    /// * `denylist` - Path segments that disqualify a candidate
    pub fn new(extensions: &[String], denylist: &[String]) -> Self {
        Self {
            script_extensions: normalize_extensions(extensions),
            denylist: denylist
                .iter()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Classifies a candidate by its path
    ///
    /// `.xml` documents are sitemaps, configured extensions are scripts, and
    /// anything else mentioning `sitemap` is a sitemap. Query strings and
    /// fragments are ignored.
    pub fn classify(&self, candidate: &str) -> Option<ResourceType> {
        let path = strip_query_and_fragment(candidate).to_lowercase();

        if path.ends_with(".xml") {
            Some(ResourceType::Sitemap)
        } else if self.script_extensions.iter().any(|ext| path.ends_with(ext)) {
            Some(ResourceType::JavaScript)
        } else if path.contains("sitemap") {
            Some(ResourceType::Sitemap)
        } else {
            None
        }
    }

    /// Returns true when any path segment is on the denylist
    pub fn is_denied(&self, candidate: &str) -> bool {
        strip_query_and_fragment(candidate)
            .split('/')
            .any(|segment| {
                let segment = segment.to_lowercase();
                self.denylist.iter().any(|d| *d == segment)
            })
    }

    /// Resolves a discovered endpoint into an absolute, fetchable URL
    ///
    /// # Arguments
    ///
    /// * `candidate` - The endpoint literal as extracted
    /// * `base` - URL of the resource it was found in
    /// * `allowed` - Accepted resource types; empty accepts every known type
    ///
    /// # Returns
    ///
    /// * `Some((url, type))` - The absolute URL and its resource type
    /// * `None` - Unknown type, denied, not allowed, or unparsable
    pub fn resolve(
        &self,
        candidate: &str,
        base: &str,
        allowed: &[ResourceType],
    ) -> Option<(String, ResourceType)> {
        let candidate = candidate.trim();
        let resource_type = self.classify(candidate)?;

        if self.is_denied(candidate) {
            return None;
        }

        if !allowed.is_empty() && !allowed.contains(&resource_type) {
            return None;
        }

        let resolved = absolutize(candidate, base)?;
        Some((resolved, resource_type))
    }
}

/// Turns a candidate into an absolute URL string
///
/// Absolute candidates pass through unchanged, protocol-relative ones get an
/// `https:` scheme, and everything else is joined onto the directory of
/// `base`.
fn absolutize(candidate: &str, base: &str) -> Option<String> {
    if let Some(rest) = candidate.strip_prefix("//") {
        let resolved = format!("https://{}", rest);
        Url::parse(&resolved).ok()?;
        return Some(resolved);
    }

    if has_scheme(candidate) {
        Url::parse(candidate).ok()?;
        return Some(candidate.to_string());
    }

    let base = Url::parse(base.trim()).ok()?;
    base.join(candidate).ok().map(|u| u.to_string())
}

/// True when the candidate starts with `scheme://`
///
/// A `://` later in the path or query does not make a candidate absolute.
fn has_scheme(candidate: &str) -> bool {
    let Some((scheme, _)) = candidate.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Lowercases extensions and gives each a leading dot
///
/// An empty list falls back to `.js`.
fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = extensions
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| {
            if e.starts_with('.') {
                e
            } else {
                format!(".{}", e)
            }
        })
        .collect();

    if normalized.is_empty() {
        normalized.push(".js".to_string());
    }

    normalized.sort();
    normalized.dedup();
    normalized
}

/// Resolves a candidate with the default extensions and denylist
///
/// # Examples
///
/// ```
/// use jsripple::url::{resolve_url, ResourceType};
///
/// let (url, kind) = resolve_url("//cdn.example.com/app.js", "https://example.com/", &[]).unwrap();
/// assert_eq!(url, "https://cdn.example.com/app.js");
/// assert_eq!(kind, ResourceType::JavaScript);
/// ```
pub fn resolve_url(
    candidate: &str,
    base: &str,
    allowed: &[ResourceType],
) -> Option<(String, ResourceType)> {
    DEFAULT_RESOLVER.resolve(candidate, base, allowed)
}

/// Resolves a candidate only if it is a script
pub fn check_url(candidate: &str, base: &str) -> Option<String> {
    resolve_url(candidate, base, &[ResourceType::JavaScript]).map(|(url, _)| url)
}
