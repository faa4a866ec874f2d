//! Catalog-Harvester: a resumable classifieds catalog crawler
//!
//! This crate walks a paginated catalog organized as region → category filter →
//! page, discovers listing pages from each catalog page, extracts structured
//! records from them and persists progress so an interrupted crawl resumes
//! exactly where it stopped.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod render;
pub mod sink;
pub mod state;
pub mod url;
pub mod worker;

use thiserror::Error;

/// Main error type for Catalog-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::UnitState,
        to: state::UnitState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Catalog-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlBounds, CrawlOutcome, CrawlPosition, Orchestrator};
pub use extract::ExtractedRecord;
pub use state::UnitState;
pub use url::canonicalize_url;
