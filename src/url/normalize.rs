use url::Url;

/// Reduces a URL to the form used for visited-set membership
///
/// # Normalization Steps
///
/// 1. Parse the URL; if it does not parse, fall back to plain truncation
/// 2. Remove the query string
/// 3. Remove the fragment
///
/// Parsing also lowercases the host and drops default ports, so
/// `https://Example.com:443/app.js?v=2` and `https://example.com/app.js#top`
/// are the same resource.
///
/// # Examples
///
/// ```
/// use jsripple::url::canonicalize;
///
/// assert_eq!(canonicalize("https://example.com/app.js?v=1#x"), "https://example.com/app.js");
/// ```
pub fn canonicalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => strip_query_and_fragment(raw).to_string(),
    }
}

/// Returns the part of `raw` before the first `?` or `#`
pub fn strip_query_and_fragment(raw: &str) -> &str {
    match raw.find(['?', '#']) {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}
