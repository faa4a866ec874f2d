//! Page renderer capability
//!
//! Workers obtain page documents through the `PageRenderer` trait. The
//! default implementation, `HttpRenderer`, fetches pages over HTTP with
//! `reqwest` and checks ready conditions against the parsed document.

mod http;

pub use http::{build_http_client, HttpRenderer};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while rendering a page
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Element '{selector}' not present on {url}")]
    ReadyTimeout { url: String, selector: String },

    #[error("Invalid ready selector '{0}'")]
    InvalidSelector(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Condition a page must meet before it counts as rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCondition {
    /// The document finished loading
    Loaded,
    /// An element matching the CSS selector is present
    ElementPresent(String),
}

/// A fully loaded page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final address after redirects
    pub final_url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Document markup
    pub html: String,
}

/// Loads a page and waits for it to become ready
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, ready: &ReadyCondition) -> Result<RenderedPage, RenderError>;
}
