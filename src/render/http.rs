//! HTTP page renderer
//!
//! This module handles all page requests made by workers, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Classifying timeouts, connection failures and non-success statuses
//! - Checking ready conditions on the returned document

use crate::config::RendererConfig;
use crate::render::{PageRenderer, ReadyCondition, RenderError, RenderedPage};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_harvester::config::RendererConfig;
/// use catalog_harvester::render::build_http_client;
///
/// let config = RendererConfig {
///     user_agent: "Mozilla/5.0".to_string(),
///     navigation_timeout_ms: 60_000,
///     child_link_selector: "a.listing".to_string(),
///     listing_ready_selector: None,
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &RendererConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_millis(config.navigation_timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Renders pages with plain HTTP requests
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self, RenderError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    /// Fetches `url` and checks the ready condition
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Request timeout | `Timeout` |
    /// | Connection or body error | `Navigation` |
    /// | Non-2xx status | `Status` |
    /// | Ready element absent | `ReadyTimeout` |
    async fn render(&self, url: &str, ready: &ReadyCondition) -> Result<RenderedPage, RenderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| classify_error(url, e))?;

        if let ReadyCondition::ElementPresent(selector) = ready {
            if !element_present(&html, selector)? {
                return Err(RenderError::ReadyTimeout {
                    url: url.to_string(),
                    selector: selector.clone(),
                });
            }
        }

        Ok(RenderedPage {
            final_url,
            status_code: status.as_u16(),
            html,
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        RenderError::Navigation {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        RenderError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

fn element_present(html: &str, selector: &str) -> Result<bool, RenderError> {
    let selector =
        Selector::parse(selector).map_err(|_| RenderError::InvalidSelector(selector.to_string()))?;
    let document = Html::parse_document(html);
    let present = document.select(&selector).next().is_some();
    Ok(present)
}
