//! Remote CSV replica on a git hosting contents API
//!
//! The replica is a CSV file in a repository. A sync downloads the current
//! file with its version token (`sha`), appends the rows written locally since
//! the previous sync and uploads the result with that token. A concurrent
//! change of the remote file makes the upload fail instead of overwriting it.

use crate::config::RemoteConfig;
use crate::extract::ExtractedRecord;
use crate::sink::csv_sink::{encode_rows, timestamp};
use crate::sink::{RecordSink, SinkError, SinkResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote file content with its version token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Client for the remote CSV replica
#[derive(Debug, Clone)]
pub struct RemoteReplica {
    client: Client,
    contents_url: String,
    branch: String,
    token: String,
}

impl RemoteReplica {
    /// Builds the replica client; returns `None` if the token variable is unset
    pub fn from_config(config: &RemoteConfig, user_agent: &str) -> SinkResult<Option<Self>> {
        match std::env::var(&config.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(Some(Self::new(
                &config.api_url,
                &config.repository,
                &config.branch,
                &config.path,
                token.trim(),
                user_agent,
            )?)),
            _ => Ok(None),
        }
    }

    pub fn new(
        api_url: &str,
        repository: &str,
        branch: &str,
        path: &str,
        token: &str,
        user_agent: &str,
    ) -> SinkResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            contents_url: format!(
                "{}/repos/{}/contents/{}",
                api_url.trim_end_matches('/'),
                repository,
                path.trim_start_matches('/')
            ),
            branch: branch.to_string(),
            token: token.to_string(),
        })
    }

    /// Downloads the current replica; a missing file is empty and unversioned
    pub async fn fetch(&self) -> SinkResult<RemoteFile> {
        let response = self
            .client
            .get(&self.contents_url)
            .query(&[("ref", self.branch.as_str())])
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(RemoteFile::default()),
            status if status.is_success() => {
                let body: ContentsResponse = response.json().await?;
                let encoded: String = body.content.split_whitespace().collect();
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| SinkError::Remote(format!("invalid base64 content: {}", e)))?;
                let content = String::from_utf8(bytes)
                    .map_err(|e| SinkError::Remote(format!("replica is not UTF-8: {}", e)))?;
                Ok(RemoteFile {
                    content,
                    sha: Some(body.sha),
                })
            }
            status => Err(SinkError::Remote(format!(
                "fetching {} returned HTTP {}",
                self.contents_url, status
            ))),
        }
    }

    /// Uploads `content` as the new replica version
    pub async fn store(&self, content: &str, sha: Option<&str>) -> SinkResult<()> {
        let request = UpdateRequest {
            message: "Append harvested records",
            content: STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha,
        };

        let response = self
            .client
            .put(&self.contents_url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(SinkError::Remote(
                format!(
                    "replica {} changed remotely (HTTP {}), upload rejected",
                    self.contents_url,
                    response.status()
                ),
            )),
            status => Err(SinkError::Remote(format!(
                "updating {} returned HTTP {}",
                self.contents_url, status
            ))),
        }
    }

    /// Appends CSV text to the replica
    ///
    /// `header` is prepended only when the remote file is empty.
    pub async fn append_rows(&self, header: &str, rows: &str) -> SinkResult<()> {
        let remote = self.fetch().await?;

        let mut content = remote.content;
        if content.trim().is_empty() {
            content = header.to_string();
        } else if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(rows);

        self.store(&content, remote.sha.as_deref()).await?;
        tracing::info!("Replica {} updated", self.contents_url);
        Ok(())
    }
}

/// A local sink whose appended records are also replicated on `sync`
///
/// Rows are buffered until a sync succeeds. A failed sync keeps the buffer
/// for the next attempt and never touches the local store.
pub struct ReplicatedSink {
    local: Box<dyn RecordSink>,
    replica: RemoteReplica,
    header: Option<String>,
    pending: String,
}

impl ReplicatedSink {
    pub fn new(local: Box<dyn RecordSink>, replica: RemoteReplica) -> Self {
        Self {
            local,
            replica,
            header: None,
            pending: String::new(),
        }
    }

    /// CSV text waiting to be replicated
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

#[async_trait]
impl RecordSink for ReplicatedSink {
    async fn append(&mut self, records: &[ExtractedRecord]) -> SinkResult<usize> {
        let written = self.local.append(records).await?;
        if records.is_empty() {
            return Ok(written);
        }

        if self.header.is_none() {
            let header = encode_rows(&records[..1], true, "")?;
            self.header = header.lines().next().map(|line| format!("{}\n", line));
        }
        self.pending
            .push_str(&encode_rows(records, false, &timestamp())?);
        Ok(written)
    }

    async fn sync(&mut self) -> SinkResult<()> {
        self.local.sync().await?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let header = self.header.clone().unwrap_or_default();
        self.replica.append_rows(&header, &self.pending).await?;
        self.pending.clear();
        Ok(())
    }
}
