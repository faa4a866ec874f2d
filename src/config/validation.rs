use crate::config::types::{
    expand_catalog_template, Config, CrawlerConfig, FieldConfig, OutputConfig, ParserConfig,
    RemoteConfig, RendererConfig,
};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

const MAX_ATTEMPTS_LIMIT: u32 = 20;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_renderer_config(&config.renderer)?;
    validate_parser_config(&config.parser)?;
    validate_output_config(&config.output)?;
    if let Some(remote) = &config.remote {
        validate_remote_config(remote)?;
    }
    Ok(())
}

/// Validates crawl space bounds, retry limits and delays
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.regions.is_empty() {
        return Err(ConfigError::Validation(
            "regions must contain at least one region".to_string(),
        ));
    }

    if let Some(region) = config.regions.iter().find(|r| r.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "region slugs cannot be blank, got '{}'",
            region
        )));
    }

    if config.max_filter < 1 {
        return Err(ConfigError::Validation(format!(
            "max_filter must be >= 1, got {}",
            config.max_filter
        )));
    }

    if config.max_page < 1 {
        return Err(ConfigError::Validation(format!(
            "max_page must be >= 1, got {}",
            config.max_page
        )));
    }

    for (name, value) in [
        ("max_attempts", config.max_attempts),
        ("listing_attempts", config.listing_attempts),
    ] {
        if value < 1 || value > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_ATTEMPTS_LIMIT, value
            )));
        }
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.operation_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "operation_timeout_ms must be >= 1000ms, got {}ms",
            config.operation_timeout_ms
        )));
    }

    validate_catalog_template(&config.catalog_url_template, &config.regions[0])
}

/// Validates that the template carries every placeholder and yields an http(s) URL
fn validate_catalog_template(template: &str, sample_region: &str) -> Result<(), ConfigError> {
    for placeholder in ["{region}", "{filter}", "{page}"] {
        if !template.contains(placeholder) {
            return Err(ConfigError::Validation(format!(
                "catalog_url_template must contain {}, got '{}'",
                placeholder, template
            )));
        }
    }

    let sample = expand_catalog_template(template, sample_region, 1, 1);
    let url = Url::parse(&sample).map_err(|e| {
        ConfigError::InvalidUrl(format!("catalog_url_template yields '{}': {}", sample, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "catalog_url_template must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.navigation_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout_ms must be >= 1000ms, got {}ms",
            config.navigation_timeout_ms
        )));
    }

    validate_selector("child_link_selector", &config.child_link_selector)?;
    if let Some(selector) = &config.listing_ready_selector {
        validate_selector("listing_ready_selector", selector)?;
    }

    Ok(())
}

/// Validates the field list of the listing parser
fn validate_parser_config(config: &ParserConfig) -> Result<(), ConfigError> {
    if config.fields.is_empty() {
        return Err(ConfigError::Validation(
            "parser must define at least one field".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for field in &config.fields {
        validate_field(field)?;
        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate parser field '{}'",
                field.name
            )));
        }
    }

    if !config.fields.iter().any(|f| f.required) {
        return Err(ConfigError::Validation(
            "parser must mark at least one field as required".to_string(),
        ));
    }

    Ok(())
}

fn validate_field(field: &FieldConfig) -> Result<(), ConfigError> {
    if field.name.trim().is_empty() || field.name == "url" {
        return Err(ConfigError::Validation(format!(
            "invalid parser field name '{}'",
            field.name
        )));
    }

    match (&field.pattern, &field.selector) {
        (Some(pattern), None) => {
            let regex = Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidPattern(format!("field '{}': {}", field.name, e))
            })?;
            if regex.captures_len() < 2 {
                return Err(ConfigError::InvalidPattern(format!(
                    "field '{}': pattern needs one capture group",
                    field.name
                )));
            }
            Ok(())
        }
        (None, Some(selector)) => validate_selector(&field.name, selector),
        _ => Err(ConfigError::Validation(format!(
            "field '{}' must set exactly one of pattern or selector",
            field.name
        ))),
    }
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("{}: invalid selector: {}", name, e)))
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.records_path == config.checkpoint_path {
        return Err(ConfigError::Validation(
            "records_path and checkpoint_path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates remote replication configuration
fn validate_remote_config(config: &RemoteConfig) -> Result<(), ConfigError> {
    Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_url: {}", e)))?;

    let parts: Vec<&str> = config.repository.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(format!(
            "repository must be in 'owner/name' form, got '{}'",
            config.repository
        )));
    }

    if config.path.is_empty() || config.path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "remote path must be relative and non-empty, got '{}'",
            config.path
        )));
    }

    if config.token_env.is_empty() {
        return Err(ConfigError::Validation(
            "token_env cannot be empty".to_string(),
        ));
    }

    Ok(())
}
