//! The endpoint grammar
//!
//! Endpoints are quoted string literals (double, single or backtick) whose
//! body looks like a URL, a path, or a file with a known extension. Each
//! delimiter variant wraps the same body in one outer capture group, so the
//! first participating group of any match is the endpoint literal.

use once_cell::sync::Lazy;
use regex::Regex;

/// `scheme://host...` or `//host...`; the host may be dot-less, as in `http://localhost:3000/api`
const ABSOLUTE_URL: &str = r#"((?:[a-zA-Z][a-zA-Z0-9+.\-]{0,30}://|//)(?:[^"'/]{1,}\.[a-zA-Z]{2,}|[a-zA-Z0-9_\-]{1,})[^"']{0,})"#;

/// `/path`, `./path`, `../path`
const RELATIVE_PATH: &str = r#"((?:/|\.\./|\./)[^"'><,;| *()%$^/\\\[\]][^"'><,;|()]{1,})"#;

/// `dir/file.ext` with a short extension or `.action`
const PATH_WITH_EXTENSION: &str = r#"([a-zA-Z0-9_\-/]{1,}/[a-zA-Z0-9_\-/.]{1,}\.(?:[a-zA-Z]{1,4}|action)(?:[\?|#][^"|']{0,}|))"#;

/// `dir/segment` where the last segment has at least three characters
const REST_PATH: &str = r#"([a-zA-Z0-9_\-/]{1,}/[a-zA-Z0-9_\-/]{3,}(?:[\?|#][^"|']{0,}|))"#;

/// Bare file names with a recognised extension
const BARE_FILE: &str = r#"([a-zA-Z0-9_\-]{1,}\.(?:php|asp|aspx|jsp|json|action|html|js|txt|xml)(?:[\?|#][^"|']{0,}|))"#;

/// Compiled endpoint grammar, built once
pub static ENDPOINT_REGEX: Lazy<Regex> = Lazy::new(|| {
    let body = endpoint_body();
    let pattern = format!("(?:\"{body}\"|'{body}'|`{body}`)");
    match Regex::new(&pattern) {
        Ok(regex) => regex,
        // The grammar is a constant; a failure here is a programming error
        Err(e) => panic!("endpoint grammar failed to compile: {e}"),
    }
});

fn endpoint_body() -> String {
    format!(
        "({}|{}|{}|{}|{})",
        ABSOLUTE_URL, RELATIVE_PATH, PATH_WITH_EXTENSION, REST_PATH, BARE_FILE
    )
}

/// Returns the compiled endpoint grammar
pub fn endpoint_regex() -> &'static Regex {
    &ENDPOINT_REGEX
}
