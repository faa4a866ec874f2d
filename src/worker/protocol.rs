//! Completion protocol between the orchestrator and its workers
//!
//! A worker process prints exactly one completion line on stdout:
//! the marker followed by a JSON `WorkerMessage`. Anything else on stdout is
//! ignored; logs go to stderr.

use crate::extract::ExtractedRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the completion line
pub const COMPLETION_MARKER: &str = "@@harvester-completion ";

/// Kind of page a worker handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// A catalog page: discover listing links
    Catalog,
    /// A listing page: extract one record
    Listing,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Listing => "listing",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work handed to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub kind: TaskKind,
    pub target: String,
}

impl WorkerTask {
    pub fn catalog(target: impl Into<String>) -> Self {
        Self {
            kind: TaskKind::Catalog,
            target: target.into(),
        }
    }

    pub fn listing(target: impl Into<String>) -> Self {
        Self {
            kind: TaskKind::Listing,
            target: target.into(),
        }
    }
}

/// Result data of a successful unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WorkerPayload {
    /// Listing addresses found on a catalog page
    Links(Vec<String>),
    /// Record of a listing page; `None` when a required field was missing
    Listing(Option<ExtractedRecord>),
}

impl WorkerPayload {
    /// Returns true if this payload is the kind `kind` produces
    pub fn answers(&self, kind: TaskKind) -> bool {
        matches!(
            (self, kind),
            (Self::Links(_), TaskKind::Catalog) | (Self::Listing(_), TaskKind::Listing)
        )
    }
}

/// The completion message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<WorkerPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerMessage {
    pub fn success(payload: WorkerPayload) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Encodes the message as a single completion line (without newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{}{}", COMPLETION_MARKER, serde_json::to_string(self)?))
    }
}

/// Finds the completion message in a worker's stdout
///
/// The last marker line wins. Returns `None` if no line carries the marker
/// or if the marked line is not a valid message.
pub fn parse_completion(stdout: &str) -> Option<WorkerMessage> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(COMPLETION_MARKER))
        .and_then(|json| serde_json::from_str(json.trim()).ok())
}
