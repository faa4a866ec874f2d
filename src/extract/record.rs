use serde::{Deserialize, Serialize};

/// Structured fields extracted from one listing page
///
/// Field order follows the parser configuration, so every record produced by
/// one parser has the same column layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Address of the listing the record came from
    pub url: String,

    /// Named field values, in configured order
    pub fields: Vec<(String, String)>,
}

impl ExtractedRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder style
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Looks up a field value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Column names of this record, starting with `url`
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once("url")
            .chain(self.fields.iter().map(|(name, _)| name.as_str()))
            .collect()
    }

    /// Column values of this record, starting with the url
    pub fn column_values(&self) -> Vec<&str> {
        std::iter::once(self.url.as_str())
            .chain(self.fields.iter().map(|(_, value)| value.as_str()))
            .collect()
    }
}
