//! Listing parser: turns a rendered listing page into a record

use crate::config::{FieldConfig, ParserConfig};
use crate::extract::ExtractedRecord;
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};

/// Extracts a record from a rendered listing document
///
/// Returns `None` when a mandatory field is absent; such listings are
/// discarded, never stored with placeholders.
pub trait ListingParser: Send + Sync {
    fn parse(&self, html: &str, source_url: &str) -> Option<ExtractedRecord>;
}

/// Where a field value is read from
#[derive(Debug)]
enum FieldSource {
    /// First capture group of a regex over the raw document
    Pattern(Regex),
    /// Text or attribute of the first element matching a selector
    Element {
        selector: Selector,
        attr: Option<String>,
    },
}

#[derive(Debug)]
struct FieldRule {
    name: String,
    source: FieldSource,
    required: bool,
    strip: Vec<char>,
}

/// Listing parser driven by the `[[parser.field]]` configuration
#[derive(Debug)]
pub struct FieldParser {
    rules: Vec<FieldRule>,
    needs_dom: bool,
}

impl FieldParser {
    /// Compiles the configured field rules
    pub fn from_config(config: &ParserConfig) -> Result<Self, ConfigError> {
        let rules = config
            .fields
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let needs_dom = rules
            .iter()
            .any(|rule| matches!(rule.source, FieldSource::Element { .. }));

        Ok(Self { rules, needs_dom })
    }

    /// Names of the fields, in output order
    pub fn field_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name.as_str()).collect()
    }
}

fn compile_rule(field: &FieldConfig) -> Result<FieldRule, ConfigError> {
    let source = match (&field.pattern, &field.selector) {
        (Some(pattern), _) => FieldSource::Pattern(
            Regex::new(pattern)
                .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", field.name, e)))?,
        ),
        (None, Some(selector)) => FieldSource::Element {
            selector: Selector::parse(selector).map_err(|e| {
                ConfigError::InvalidPattern(format!("{}: invalid selector: {}", field.name, e))
            })?,
            attr: field.attr.clone(),
        },
        (None, None) => {
            return Err(ConfigError::Validation(format!(
                "field '{}' has neither pattern nor selector",
                field.name
            )))
        }
    };

    Ok(FieldRule {
        name: field.name.clone(),
        source,
        required: field.required,
        strip: field.strip.chars().collect(),
    })
}

impl ListingParser for FieldParser {
    fn parse(&self, html: &str, source_url: &str) -> Option<ExtractedRecord> {
        let document = self.needs_dom.then(|| Html::parse_document(html));
        let mut record = ExtractedRecord::new(source_url);

        for rule in &self.rules {
            let raw = match &rule.source {
                FieldSource::Pattern(regex) => regex
                    .captures(html)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
                FieldSource::Element { selector, attr } => document
                    .as_ref()
                    .and_then(|doc| doc.select(selector).next())
                    .and_then(|element| match attr {
                        Some(attr) => element.value().attr(attr).map(str::to_string),
                        None => Some(element.text().collect::<Vec<_>>().join(" ")),
                    }),
            };

            let value = raw
                .map(|value| clean_value(&value, &rule.strip))
                .filter(|value| !value.is_empty());

            match value {
                Some(value) => record.fields.push((rule.name.clone(), value)),
                None if rule.required => {
                    tracing::debug!(
                        "Discarding {}: required field '{}' missing",
                        source_url,
                        rule.name
                    );
                    return None;
                }
                None => record.fields.push((rule.name.clone(), String::new())),
            }
        }

        Some(record)
    }
}

/// Removes strip characters and collapses whitespace
fn clean_value(value: &str, strip: &[char]) -> String {
    value
        .chars()
        .filter(|c| !strip.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
