//! gf-style tagging of discovered endpoints
//!
//! Rules are JSON files in a directory (by default `~/.gf`). Each file
//! names a rule after its stem and holds a `pattern`, a list of `patterns`,
//! or both, plus optional `flags` (`i` makes every pattern case-insensitive).

use crate::output::ResourceReport;
use crate::TaggingError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const RULE_EXTENSION: &str = "json";

/// A loaded tagging rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub patterns: Vec<Regex>,
}

/// An endpoint matched by one or more rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub resource: String,
    pub line: usize,
    pub evidence: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub context: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    pattern: String,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    flags: String,
}

#[derive(Debug, Serialize)]
struct FindingsReport<'a> {
    generated_at: DateTime<Utc>,
    rules: &'a [String],
    findings: &'a [Finding],
}

/// Returns `~/.gf`
pub fn default_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".gf"))
}

/// Loads rules from `dir`
///
/// # Arguments
///
/// * `dir` - Directory holding the rule files
/// * `names` - Rule names, with or without the `.json` extension
/// * `use_all` - Ignore `names` and load every rule file in `dir`
///
/// # Returns
///
/// Rules sorted by name.
pub fn load_rules(dir: &Path, names: &[String], use_all: bool) -> Result<Vec<Rule>, TaggingError> {
    if !dir.is_dir() {
        return Err(TaggingError::MissingDirectory(dir.display().to_string()));
    }

    let files = if use_all {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(RULE_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        files
    } else {
        let mut files = Vec::new();
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let filename = if name.ends_with(".json") {
                name.to_string()
            } else {
                format!("{}.{}", name, RULE_EXTENSION)
            };
            let path = dir.join(&filename);
            if !path.is_file() {
                return Err(TaggingError::MissingRule {
                    name: filename,
                    dir: dir.display().to_string(),
                });
            }
            files.push(path);
        }
        files
    };

    if files.is_empty() {
        return Err(TaggingError::NoRules(dir.display().to_string()));
    }

    let mut rules = files
        .iter()
        .map(|path| parse_rule(path))
        .collect::<Result<Vec<_>, _>>()?;
    rules.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!("Loaded {} tagging rules from {}", rules.len(), dir.display());
    Ok(rules)
}

fn parse_rule(path: &Path) -> Result<Rule, TaggingError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let parse_error = |message: String| TaggingError::Parse {
        name: name.clone(),
        message,
    };

    let content = std::fs::read_to_string(path)?;
    let file: RuleFile = serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;

    let mut raw_patterns = Vec::new();
    if !file.pattern.is_empty() {
        raw_patterns.push(file.pattern);
    }
    raw_patterns.extend(file.patterns);

    if raw_patterns.is_empty() {
        return Err(parse_error("rule does not define any patterns".to_string()));
    }

    let ignore_case = file.flags.to_lowercase().contains('i');
    let patterns = raw_patterns
        .iter()
        .map(|raw| {
            let pattern = if ignore_case && !raw.starts_with("(?i)") {
                format!("(?i){}", raw)
            } else {
                raw.clone()
            };
            Regex::new(&pattern).map_err(|e| parse_error(format!("invalid pattern {:?}: {}", raw, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Rule { name, patterns })
}

/// Runs every rule against the endpoint links of every report
///
/// Matches at the same resource, line and evidence are merged into one
/// finding listing all matching rules. The result is sorted by resource,
/// line, evidence and rule list, so it does not depend on report order.
pub fn find_in_reports(reports: &[ResourceReport], rules: &[Rule]) -> Vec<Finding> {
    let mut by_key: HashMap<(String, usize, String), Finding> = HashMap::new();

    for report in reports {
        for endpoint in &report.endpoints {
            let context = endpoint.context.trim();

            for rule in rules {
                for pattern in &rule.patterns {
                    for m in pattern.find_iter(&endpoint.link) {
                        let key = (report.resource.clone(), endpoint.line, m.as_str().to_string());
                        let finding = by_key.entry(key).or_insert_with(|| Finding {
                            resource: report.resource.clone(),
                            line: endpoint.line,
                            evidence: m.as_str().to_string(),
                            context: context.to_string(),
                            rules: Vec::new(),
                        });

                        if finding.context.is_empty() && !context.is_empty() {
                            finding.context = context.to_string();
                        }
                        if !finding.rules.contains(&rule.name) {
                            finding.rules.push(rule.name.clone());
                        }
                    }
                }
            }
        }
    }

    let mut findings: Vec<Finding> = by_key
        .into_values()
        .map(|mut f| {
            f.rules.sort();
            f
        })
        .collect();

    findings.sort_by(|a, b| {
        a.resource
            .cmp(&b.resource)
            .then(a.line.cmp(&b.line))
            .then_with(|| a.evidence.cmp(&b.evidence))
            .then_with(|| a.rules.join(",").cmp(&b.rules.join(",")))
    });
    findings
}

/// Sorted names of the loaded rules
pub fn rule_names(rules: &[Rule]) -> Vec<String> {
    let mut names: Vec<String> = rules.iter().map(|r| r.name.clone()).collect();
    names.sort();
    names
}

/// Writes findings as plain text
pub fn write_findings<W: Write + ?Sized>(
    out: &mut W,
    rules: &[String],
    findings: &[Finding],
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "gf findings")?;
    writeln!(out, "===========")?;
    if rules.is_empty() {
        writeln!(out, "Rules: none")?;
    } else {
        writeln!(out, "Rules: {}", rules.join(", "))?;
    }
    writeln!(out, "Total findings: {}", findings.len())?;

    if findings.is_empty() {
        writeln!(out, "No gf findings were detected.")?;
        return Ok(());
    }

    for finding in findings {
        writeln!(out)?;
        writeln!(out, "Resource: {}", finding.resource)?;
        writeln!(out, "  Line: {}", finding.line)?;
        writeln!(out, "  Rules: {}", finding.rules.join(", "))?;
        writeln!(out, "  Evidence: {}", finding.evidence)?;
    }
    Ok(())
}

/// Renders findings as a pretty-printed JSON document
pub fn findings_to_json(
    generated_at: DateTime<Utc>,
    rules: &[String],
    findings: &[Finding],
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&FindingsReport {
        generated_at,
        rules,
        findings,
    })
}
