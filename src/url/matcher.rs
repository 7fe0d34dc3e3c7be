use crate::url::domain::{extract_host, scope_host};

/// Checks if a host falls inside a scope host
///
/// Without subdomain inclusion only the exact host matches. With it, the
/// scope host itself and any dot-separated subdomain of it match, so
/// `api.v2.example.com` is inside `example.com` while `badexample.com` is not.
///
/// Both arguments are expected to be lowercase already.
///
/// # Examples
///
/// ```
/// use jsripple::url::host_in_scope;
///
/// assert!(host_in_scope("example.com", "example.com", false));
/// assert!(!host_in_scope("example.com", "cdn.example.com", false));
/// assert!(host_in_scope("example.com", "cdn.example.com", true));
/// assert!(!host_in_scope("example.com", "badexample.com", true));
/// ```
pub fn host_in_scope(scope: &str, candidate: &str, include_subdomains: bool) -> bool {
    if candidate == scope {
        return true;
    }
    include_subdomains && candidate.ends_with(&format!(".{}", scope))
}

/// Tests whether a resource URL is inside the configured scope
///
/// An empty scope accepts everything. A scope that cannot be parsed, or a
/// resource without a host, is out of scope.
///
/// # Arguments
///
/// * `resource_url` - Absolute URL of the candidate resource
/// * `scope` - Scope host, with or without scheme and port
/// * `include_subdomains` - Whether subdomains of the scope host are accepted
pub fn within_scope(resource_url: &str, scope: &str, include_subdomains: bool) -> bool {
    if scope.trim().is_empty() {
        return true;
    }

    let Some(scope) = scope_host(scope) else {
        return false;
    };

    match extract_host(resource_url) {
        Some(host) => host_in_scope(&scope, &host, include_subdomains),
        None => false,
    }
}
