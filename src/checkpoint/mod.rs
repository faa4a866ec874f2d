//! Checkpoint persistence
//!
//! The checkpoint records the next catalog position to visit. It is the only
//! progress state that survives a restart; it is overwritten after every
//! catalog page and reset to the initial position when the crawl completes.

mod file;

pub use file::FileCheckpointStore;

use crate::crawler::CrawlPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version of the on-disk checkpoint layout
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while reading or writing the checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to replace checkpoint {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// A persisted crawl position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub schema_version: u32,

    #[serde(flatten)]
    pub position: CrawlPosition,

    /// Hash of the configuration the position was recorded under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Creates a checkpoint stamped with the current time
    pub fn new(position: CrawlPosition, config_hash: Option<String>) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            position,
            config_hash,
            saved_at: Utc::now(),
        }
    }
}

/// Durable storage for the crawl checkpoint
pub trait CheckpointStore: Send + Sync {
    /// Loads the stored checkpoint
    ///
    /// Returns `Ok(None)` when nothing usable is stored: the checkpoint is
    /// missing, cannot be parsed or has an unknown schema version.
    fn load(&self) -> CheckpointResult<Option<Checkpoint>>;

    /// Replaces the stored checkpoint; after success a crash never exposes
    /// a partially written checkpoint
    fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()>;
}
