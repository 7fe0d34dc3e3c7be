//! Burp Suite XML export reader
//!
//! Only the parts of the export needed for analysis are read: each
//! `<item>`'s `<url>` and its base64-encoded `<response>`.

use crate::crawler::Target;
use crate::InputError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static ITEM_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<item>(.*?)</item>"));
static URL_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<url>(.*?)</url>"));
static RESPONSE_REGEX: Lazy<Regex> =
    Lazy::new(|| compile(r"(?s)<response(?:\s[^>]*)?>(.*?)</response>"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Constant patterns; failing to compile is a programming error
        Err(e) => panic!("invalid Burp pattern {}: {}", pattern, e),
    }
}

/// Reads an export file into prefetched targets
pub fn read_burp_file(path: &Path) -> Result<Vec<Target>, InputError> {
    let data = std::fs::read_to_string(path)?;
    parse_burp_export(&data)
}

/// Parses export XML into prefetched targets
///
/// Items without a `<url>` are rejected. An item whose response is missing
/// yields an empty document.
pub fn parse_burp_export(xml: &str) -> Result<Vec<Target>, InputError> {
    let mut targets = Vec::new();

    for (index, item) in ITEM_REGEX.captures_iter(xml).enumerate() {
        let body = item.get(1).map(|m| m.as_str()).unwrap_or("");

        let url = URL_REGEX
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| html_escape::decode_html_entities(strip_cdata(m.as_str()).trim()).into_owned())
            .ok_or_else(|| InputError::Burp(format!("item {} has no <url>", index + 1)))?;

        let encoded = RESPONSE_REGEX
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| strip_cdata(m.as_str()))
            .unwrap_or("");
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

        let decoded = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| InputError::Burp(format!("response for {} is not base64: {}", url, e)))?;

        targets.push(Target::prefetched(
            url,
            String::from_utf8_lossy(&decoded).into_owned(),
        ));
    }

    tracing::debug!("Read {} items from Burp export", targets.len());
    Ok(targets)
}

fn strip_cdata(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(trimmed)
}
