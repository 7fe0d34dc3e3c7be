use url::Url;

/// Extracts the lowercase host from a URL string
///
/// Ports are never part of the result.
///
/// # Examples
///
/// ```
/// use jsripple::url::extract_host;
///
/// assert_eq!(extract_host("https://EXAMPLE.COM:8443/app.js"), Some("example.com".to_string()));
/// assert_eq!(extract_host("not a url"), None);
/// ```
pub fn extract_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_end_matches('.').to_lowercase())
}

/// Extracts the host a scope string refers to
///
/// The scope may carry a scheme (`https://example.com/`) or be a bare host,
/// optionally with a port (`example.com:8080`).
///
/// # Returns
///
/// * `Some(String)` - The lowercase scope host
/// * `None` - The scope is empty or cannot be parsed
pub fn scope_host(scope: &str) -> Option<String> {
    let scope = scope.trim();
    if scope.is_empty() {
        return None;
    }

    if scope.contains("://") {
        extract_host(scope)
    } else {
        extract_host(&format!("http://{}", scope))
    }
}
