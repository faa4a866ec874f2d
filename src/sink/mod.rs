//! Record sinks
//!
//! This module handles everything that happens to a record after extraction:
//! - Appending CSV rows or SQLite rows to the local record store
//! - Replicating newly appended rows to a remote copy of the CSV file
//!
//! Sink failures never abort a crawl; the orchestrator logs and counts them.

mod csv_sink;
mod replica;
mod schema;
mod sqlite_sink;

pub use csv_sink::{encode_rows, CsvSink};
pub use replica::{RemoteReplica, ReplicatedSink};
pub use sqlite_sink::SqliteSink;

use crate::config::{Config, OutputFormat};
use crate::extract::ExtractedRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Name of the timestamp column appended to every stored record
pub const SCRAPED_AT_COLUMN: &str = "scraped_at";

/// Errors that can occur while storing records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to open record store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote replica error: {0}")]
    Remote(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Durable destination for extracted records
#[async_trait]
pub trait RecordSink: Send {
    /// Appends records to the local store; returns how many were written
    async fn append(&mut self, records: &[ExtractedRecord]) -> SinkResult<usize>;

    /// Flushes local writes and replicates everything appended since the last sync
    async fn sync(&mut self) -> SinkResult<()>;
}

/// Builds the sink described by `[output]` and the optional `[remote]` section
pub fn build_sink(config: &Config) -> SinkResult<Box<dyn RecordSink>> {
    let path = &config.output.records_path;
    let local: Box<dyn RecordSink> = match config.output.format {
        OutputFormat::Csv => Box::new(CsvSink::open(path)?),
        OutputFormat::Sqlite => Box::new(SqliteSink::open(path)?),
    };
    tracing::info!(
        "Writing records to {} ({:?})",
        path,
        config.output.format
    );

    let Some(remote) = &config.remote else {
        return Ok(local);
    };

    match RemoteReplica::from_config(remote, &config.renderer.user_agent)? {
        Some(replica) => {
            tracing::info!(
                "Replicating records to {}:{} on {}",
                remote.repository,
                remote.path,
                remote.branch
            );
            Ok(Box::new(ReplicatedSink::new(local, replica)))
        }
        None => {
            tracing::warn!(
                "Environment variable {} is not set, remote replication disabled",
                remote.token_env
            );
            Ok(local)
        }
    }
}
