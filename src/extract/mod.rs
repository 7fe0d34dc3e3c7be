//! Endpoint extraction
//!
//! This module finds endpoint-like string literals in HTML or JavaScript
//! source and records where they were found:
//! - the literal itself
//! - the 1-based line of the match
//! - optionally, the full source line around it

mod beautify;
mod pattern;

pub use beautify::{beautify, beautify_within, DEFAULT_BEAUTIFY_TIMEOUT, LARGE_INPUT_THRESHOLD};
pub use pattern::{endpoint_regex, ENDPOINT_REGEX};

use regex::Regex;
use std::collections::HashSet;

const CONTEXT_DELIMITER: char = '\n';

/// A candidate endpoint found in a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// The literal as it appears between the quotes
    pub link: String,

    /// The source line containing the match (empty unless context was requested)
    pub context: String,

    /// 1-based line number of the match
    pub line: usize,
}

/// Extracts endpoints from document text
///
/// # Arguments
///
/// * `content` - HTML or JavaScript source
/// * `pattern` - The endpoint grammar, normally [`endpoint_regex`]
/// * `include_context` - Beautify first and capture the line around each match
/// * `filter` - Keep only links matching this expression
/// * `dedupe` - Keep only the first occurrence of each literal within this call
///
/// # Returns
///
/// Endpoints in the order they appear in the (possibly beautified) text.
///
/// # Example
///
/// ```
/// use jsripple::extract::{endpoint_regex, find_endpoints};
///
/// let found = find_endpoints("var a = '/api/users';", endpoint_regex(), false, None, true);
/// assert_eq!(found[0].link, "/api/users");
/// assert_eq!(found[0].line, 1);
/// ```
pub fn find_endpoints(
    content: &str,
    pattern: &Regex,
    include_context: bool,
    filter: Option<&Regex>,
    dedupe: bool,
) -> Vec<Endpoint> {
    let processed;
    let text = if include_context {
        processed = beautify(content);
        processed.as_str()
    } else {
        content
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut results = Vec::new();

    // Matches come in increasing order, so line numbers are counted incrementally
    let mut counted_to = 0;
    let mut line = 1;

    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some(link) = (1..caps.len()).find_map(|i| caps.get(i)) else {
            continue;
        };
        let link = link.as_str();

        if let Some(filter) = filter {
            if !filter.is_match(link) {
                continue;
            }
        }

        if dedupe && !seen.insert(link) {
            continue;
        }

        line += count_newlines(&text[counted_to..whole.start()]);
        counted_to = whole.start();

        let context = if include_context {
            extract_context(text, whole.start(), whole.end()).to_string()
        } else {
            String::new()
        };

        results.push(Endpoint {
            link: link.to_string(),
            context,
            line,
        });
    }

    results
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}

/// Returns the text between the newline before `start` and the newline after `end`
///
/// Missing delimiters extend the context to the start or end of the content.
fn extract_context(content: &str, start: usize, end: usize) -> &str {
    let from = content[..start]
        .rfind(CONTEXT_DELIMITER)
        .map(|idx| idx + CONTEXT_DELIMITER.len_utf8())
        .unwrap_or(0);
    let to = content[end..]
        .find(CONTEXT_DELIMITER)
        .map(|idx| end + idx)
        .unwrap_or(content.len());

    &content[from..to]
}

/// HTML-escapes a context line and marks every occurrence of the link
///
/// # Example
///
/// ```
/// use jsripple::extract::highlight_context;
///
/// let html = highlight_context("if (a < b) go(/api)", "/api");
/// assert_eq!(html, "if (a &lt; b) go(<mark class='highlight'>/api</mark>)");
/// ```
pub fn highlight_context(context: &str, link: &str) -> String {
    let escaped_context = html_escape::encode_quoted_attribute(context);
    let escaped_link = html_escape::encode_quoted_attribute(link);
    if escaped_link.is_empty() {
        return escaped_context.into_owned();
    }
    escaped_context.replace(
        escaped_link.as_ref(),
        &format!("<mark class='highlight'>{}</mark>", escaped_link),
    )
}
