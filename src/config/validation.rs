use crate::config::types::{Config, CrawlConfig, ExtractConfig, FetchConfig, TaggingConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Runs before any target is resolved or fetched, so a bad filter expression
/// never leaves partial work behind.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_inputs(&config.inputs, config.burp)?;
    validate_crawl_config(&config.crawl)?;
    validate_fetch_config(&config.fetch)?;
    validate_extract_config(&config.extract)?;
    validate_tagging_config(&config.tagging)?;
    Ok(())
}

fn validate_inputs(inputs: &[String], burp: bool) -> Result<(), ConfigError> {
    if inputs.iter().all(|i| i.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "at least one input is required".to_string(),
        ));
    }

    if burp {
        if let Some(url) = inputs.iter().find(|i| i.contains("://")) {
            return Err(ConfigError::Validation(format!(
                "burp mode requires file inputs, got {}",
                url
            )));
        }
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    if config.workers < 1 {
        return Err(ConfigError::Validation(format!(
            "workers must be at least 1, got {}",
            config.workers
        )));
    }

    if let Some(scope) = config.scope.as_deref() {
        if !scope.is_empty() && crate::url::scope_host(scope).is_none() {
            return Err(ConfigError::InvalidUrl(format!("Invalid scope: {}", scope)));
        }
    }

    Ok(())
}

/// Validates transport configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if !config.timeout_secs.is_finite() || config.timeout_secs <= 0.0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be greater than 0".to_string(),
        ));
    }

    if let Some(proxy) = config.proxy.as_deref() {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy: {}", e)))?;
    }

    for header in &config.headers {
        if header.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "header names cannot be empty".to_string(),
            ));
        }
    }

    if config.render && !cfg!(feature = "browser") {
        return Err(ConfigError::Validation(
            "render mode requires jsripple to be built with the `browser` feature".to_string(),
        ));
    }

    Ok(())
}

fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    config.compile_filter()?;
    Ok(())
}

fn validate_tagging_config(config: &TaggingConfig) -> Result<(), ConfigError> {
    if config.rules.iter().any(|r| r.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "tagging rule names cannot be empty".to_string(),
        ));
    }
    Ok(())
}
