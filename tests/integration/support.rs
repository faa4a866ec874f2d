//! Shared fixtures for the integration tests

use catalog_harvester::checkpoint::{
    Checkpoint, CheckpointResult, CheckpointStore, FileCheckpointStore,
};
use catalog_harvester::config::{parse_config, Config};
use catalog_harvester::crawler::{CrawlPosition, Orchestrator};
use catalog_harvester::sink::build_sink;
use catalog_harvester::worker::build_executor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Crawl configuration against `@SERVER@`, writing below `@DIR@`
const CONFIG_TEMPLATE: &str = r#"
[crawler]
regions = ["punjab"]
max-filter = 2
max-page = 1
catalog-url-template = "@SERVER@/{region}/cars?filter={filter}&page={page}"
max-attempts = 5
listing-attempts = 2
min-delay-ms = 0
max-delay-ms = 0
operation-timeout-ms = @TIMEOUT@
isolation = "@ISOLATION@"

[renderer]
user-agent = "TestHarvester/1.0"
navigation-timeout-ms = 5000
child-link-selector = "a.ad"

[[parser.field]]
name = "title"
selector = "h1.title"

[[parser.field]]
name = "phone"
pattern = '"phoneNumber":"(\+?92\d{9,10})"'
required = true

[output]
records-path = "@DIR@/data/data.csv"
checkpoint-path = "@DIR@/state.json"
"#;

pub fn config_toml(server: &MockServer, dir: &Path, isolation: &str, timeout_ms: u64) -> String {
    CONFIG_TEMPLATE
        .replace("@SERVER@", &server.uri())
        .replace("@DIR@", &dir.display().to_string())
        .replace("@ISOLATION@", isolation)
        .replace("@TIMEOUT@", &timeout_ms.to_string())
}

/// Builds an in-process configuration for `server`
pub fn task_config(server: &MockServer, dir: &Path) -> Config {
    parse_config(&config_toml(server, dir, "task", 5000)).unwrap()
}

/// Writes a configuration file into `dir` and returns its path
pub fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("harvester.toml");
    std::fs::write(&path, content).unwrap();
    path
}

pub fn catalog_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a class="ad" href="{}">listing</a>"#, href))
        .collect();
    format!("<html><body><main>{}</main></body></html>", anchors)
}

pub fn listing_page(title: &str, phone: Option<&str>) -> String {
    let script = phone
        .map(|p| format!(r#"<script>window.state={{"phoneNumber":"{}"}}</script>"#, p))
        .unwrap_or_default();
    format!(
        r#"<html><body><h1 class="title">{}</h1>{}</body></html>"#,
        title, script
    )
}

pub async fn mount_catalog(server: &MockServer, filter: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/punjab/cars"))
        .and(query_param("filter", filter.to_string()))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_listing(server: &MockServer, item: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(item))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// File store that also records every saved position and signals each save
#[derive(Clone)]
pub struct RecordingStore {
    inner: FileCheckpointStore,
    pub saved: Arc<Mutex<Vec<CrawlPosition>>>,
    pub on_save: Arc<Notify>,
}

impl RecordingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: FileCheckpointStore::new(path),
            saved: Arc::new(Mutex::new(Vec::new())),
            on_save: Arc::new(Notify::new()),
        }
    }

    pub fn positions(&self) -> Vec<CrawlPosition> {
        self.saved.lock().unwrap().clone()
    }
}

impl CheckpointStore for RecordingStore {
    fn load(&self) -> CheckpointResult<Option<Checkpoint>> {
        self.inner.load()
    }

    fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        self.inner.save(checkpoint)?;
        self.saved.lock().unwrap().push(checkpoint.position);
        self.on_save.notify_one();
        Ok(())
    }
}

/// Wires the orchestrator exactly as the binary does, with in-process workers
pub fn orchestrator(config: &Config, store: &RecordingStore) -> Orchestrator {
    let executor = build_executor(config, Vec::new()).unwrap();
    let sink = build_sink(config).unwrap();
    Orchestrator::new(config, executor, Box::new(store.clone()), sink)
}

/// Data lines of a CSV file, header excluded
pub fn csv_rows(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}
