//! Worker-side execution of one unit of work

use crate::config::Config;
use crate::extract::{extract_child_links, FieldParser, ListingParser};
use crate::render::{HttpRenderer, PageRenderer, ReadyCondition, RenderError};
use crate::worker::protocol::{TaskKind, WorkerMessage, WorkerPayload, WorkerTask};
use crate::{ConfigError, HarvestError};
use scraper::Selector;
use std::io::Write;
use std::sync::Arc;
use url::Url;

/// Everything a worker needs to render and extract pages
pub struct WorkerContext {
    renderer: Arc<dyn PageRenderer>,
    parser: Arc<dyn ListingParser>,
    child_link_selector: Selector,
    listing_ready: ReadyCondition,
}

impl WorkerContext {
    /// Builds the context from configuration with the HTTP renderer
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let renderer = Arc::new(HttpRenderer::new(&config.renderer)?);
        let parser = Arc::new(FieldParser::from_config(&config.parser)?);
        Self::new(
            renderer,
            parser,
            &config.renderer.child_link_selector,
            config.renderer.listing_ready_selector.as_deref(),
        )
    }

    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        parser: Arc<dyn ListingParser>,
        child_link_selector: &str,
        listing_ready_selector: Option<&str>,
    ) -> Result<Self, HarvestError> {
        let child_link_selector = Selector::parse(child_link_selector).map_err(|e| {
            ConfigError::InvalidPattern(format!("child_link_selector: {}", e))
        })?;
        let listing_ready = match listing_ready_selector {
            Some(selector) => ReadyCondition::ElementPresent(selector.to_string()),
            None => ReadyCondition::Loaded,
        };

        Ok(Self {
            renderer,
            parser,
            child_link_selector,
            listing_ready,
        })
    }

    /// Renders the task target and extracts its payload
    pub async fn run_task(&self, task: &WorkerTask) -> Result<WorkerPayload, RenderError> {
        match task.kind {
            TaskKind::Catalog => {
                let page = self
                    .renderer
                    .render(&task.target, &ReadyCondition::Loaded)
                    .await?;
                let base = Url::parse(&page.final_url).map_err(|e| RenderError::Navigation {
                    url: task.target.clone(),
                    message: format!("unusable final URL '{}': {}", page.final_url, e),
                })?;
                let links = extract_child_links(&page.html, &base, &self.child_link_selector);
                tracing::info!("Found {} child pages on {}", links.len(), task.target);
                for (idx, link) in links.iter().enumerate() {
                    tracing::debug!("[Child {}] {}", idx + 1, link);
                }
                Ok(WorkerPayload::Links(links))
            }
            TaskKind::Listing => {
                let page = self.renderer.render(&task.target, &self.listing_ready).await?;
                let record = self.parser.parse(&page.html, &task.target);
                if record.is_none() {
                    tracing::info!("No record extracted from {}", task.target);
                }
                Ok(WorkerPayload::Listing(record))
            }
        }
    }
}

/// Runs one task inside a worker process and prints the completion line
///
/// Returns true if the unit succeeded; the caller turns this into the
/// process exit code.
pub async fn serve_worker(config: &Config, task: &WorkerTask) -> bool {
    let message = match WorkerContext::from_config(config) {
        Ok(context) => match context.run_task(task).await {
            Ok(payload) => WorkerMessage::success(payload),
            Err(e) => {
                tracing::error!("Worker failed on {}: {}", task.target, e);
                WorkerMessage::failure(e.to_string())
            }
        },
        Err(e) => {
            tracing::error!("Worker could not start: {}", e);
            WorkerMessage::failure(e.to_string())
        }
    };

    let success = message.success;
    match message.to_line() {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
                tracing::error!("Failed to report completion: {}", e);
                return false;
            }
        }
        Err(e) => {
            tracing::error!("Failed to encode completion message: {}", e);
            return false;
        }
    }
    success
}
