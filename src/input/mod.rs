//! Turning user input into crawl targets
//!
//! An input may be a URL, a local file, a file-name wildcard within a
//! directory, or (in Burp mode) a Burp Suite XML export.

mod burp;

pub use burp::{parse_burp_export, read_burp_file};

use crate::crawler::Target;
use crate::InputError;
use regex::Regex;
use std::path::{Path, PathBuf};
use url::Url;

const VIEW_SOURCE_PREFIX: &str = "view-source:";
const URL_SCHEMES: &[&str] = &["http://", "https://", "file://", "ftp://", "ftps://"];

/// Resolves every input into targets, preserving input order
///
/// # Returns
///
/// * `Ok(Vec<Target>)` - Seeds for the crawl
/// * `Err(InputError)` - No inputs, or any input could not be resolved
pub fn resolve_targets(inputs: &[String], burp: bool) -> Result<Vec<Target>, InputError> {
    if inputs.iter().all(|i| i.trim().is_empty()) {
        return Err(InputError::Empty);
    }

    let mut targets = Vec::new();
    for input in inputs.iter().filter(|i| !i.trim().is_empty()) {
        let resolved = resolve_input(input.trim(), burp)?;
        tracing::debug!("Input {} resolved to {} targets", input, resolved.len());
        targets.extend(resolved);
    }
    Ok(targets)
}

/// Resolves a single input
pub fn resolve_input(input: &str, burp: bool) -> Result<Vec<Target>, InputError> {
    let input = input.strip_prefix(VIEW_SOURCE_PREFIX).unwrap_or(input);

    if URL_SCHEMES.iter().any(|scheme| input.starts_with(scheme)) {
        if burp {
            return Err(InputError::BurpRequiresFile(input.to_string()));
        }
        return Ok(vec![Target::url(input)]);
    }

    if burp {
        return read_burp_file(Path::new(input));
    }

    if input.contains('*') {
        return resolve_wildcard(input);
    }

    let path = Path::new(input);
    if path.exists() {
        return Ok(vec![Target::url(file_url(path)?)]);
    }

    Err(InputError::NotFound(input.to_string()))
}

/// Expands a file-name wildcard such as `static/*.js`
///
/// Only the last path component may contain `*`. Matches are regular files,
/// sorted by path.
fn resolve_wildcard(pattern: &str) -> Result<Vec<Target>, InputError> {
    let path = Path::new(pattern);
    let file_pattern = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| InputError::NoWildcardMatches(pattern.to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let matcher = wildcard_regex(file_pattern)
        .ok_or_else(|| InputError::NoWildcardMatches(pattern.to_string()))?;
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Err(InputError::NoWildcardMatches(pattern.to_string())),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if matcher.is_match(name) && entry.file_type()?.is_file() {
            matches.push(entry.path());
        }
    }

    if matches.is_empty() {
        return Err(InputError::NoWildcardMatches(pattern.to_string()));
    }

    matches.sort();
    matches
        .iter()
        .map(|p| file_url(p).map(Target::url))
        .collect()
}

/// Translates `*` and `?` into an anchored regular expression
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut translated = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            _ => translated.push_str(&regex::escape(&c.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).ok()
}

/// Builds a `file://` URL for a local path
fn file_url(path: &Path) -> Result<String, InputError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| InputError::NotFound(path.display().to_string()))
}
