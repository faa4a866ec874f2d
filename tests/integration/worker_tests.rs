//! Process-isolated workers running the real binary

use crate::support::*;
use catalog_harvester::checkpoint::FileCheckpointStore;
use catalog_harvester::crawler::{CrawlOutcome, DelayPolicy, Orchestrator};
use catalog_harvester::sink::build_sink;
use catalog_harvester::worker::{
    ProcessExecutor, WorkerExecutor, WorkerFailure, WorkerPayload, WorkerTask,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BINARY: &str = env!("CARGO_BIN_EXE_catalog-harvester");

fn executor(config_path: &Path, timeout: Duration) -> ProcessExecutor {
    ProcessExecutor::new(BINARY, vec![config_path.into(), "-q".into()], timeout)
}

#[tokio::test]
async fn test_catalog_worker_reports_links() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server, 1, catalog_page(&["/item/1", "/item/2", "/item/1"])).await;

    let config_path = write_config(dir.path(), &config_toml(&server, dir.path(), "process", 20_000));
    let target = format!("{}/punjab/cars?filter=1&page=1", server.uri());

    let payload = executor(&config_path, Duration::from_secs(20))
        .execute(&WorkerTask::catalog(target))
        .await
        .unwrap();

    assert_eq!(
        payload,
        WorkerPayload::Links(vec![
            format!("{}/item/1", server.uri()),
            format!("{}/item/2", server.uri()),
        ])
    );
}

#[tokio::test]
async fn test_listing_worker_reports_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_listing(&server, "/item/1", listing_page("Corolla", Some("+923001111111"))).await;

    let config_path = write_config(dir.path(), &config_toml(&server, dir.path(), "process", 20_000));
    let payload = executor(&config_path, Duration::from_secs(20))
        .execute(&WorkerTask::listing(format!("{}/item/1", server.uri())))
        .await
        .unwrap();

    match payload {
        WorkerPayload::Listing(Some(record)) => {
            assert_eq!(record.get("title"), Some("Corolla"));
            assert_eq!(record.get("phone"), Some("+923001111111"));
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_render_is_reported_by_worker() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let config_path = write_config(dir.path(), &config_toml(&server, dir.path(), "process", 20_000));
    let result = executor(&config_path, Duration::from_secs(20))
        .execute(&WorkerTask::catalog(format!("{}/punjab/cars", server.uri())))
        .await;

    assert!(matches!(result, Err(WorkerFailure::Reported(msg)) if msg.contains("403")));
}

#[tokio::test]
async fn test_hung_worker_is_killed_after_timeout() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/item/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page("Late", Some("+923001111111")))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let config_path = write_config(dir.path(), &config_toml(&server, dir.path(), "process", 20_000));
    let start = std::time::Instant::now();
    let result = executor(&config_path, Duration::from_millis(1500))
        .execute(&WorkerTask::listing(format!("{}/item/slow", server.uri())))
        .await;

    assert!(matches!(result, Err(WorkerFailure::Timeout(_))));
    assert!(start.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
async fn test_crawl_with_process_workers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server, 1, catalog_page(&["/item/1"])).await;
    mount_catalog(&server, 2, catalog_page(&["/item/2"])).await;
    mount_listing(&server, "/item/1", listing_page("Corolla", Some("+923001111111"))).await;
    mount_listing(&server, "/item/2", listing_page("Civic", None)).await;

    let toml = config_toml(&server, dir.path(), "process", 20_000);
    let config_path = write_config(dir.path(), &toml);
    let config = catalog_harvester::config::load_config(&config_path).unwrap();

    let executor: Arc<dyn WorkerExecutor> =
        Arc::new(executor(&config_path, Duration::from_secs(20)));
    let mut orchestrator = Orchestrator::new(
        &config,
        executor,
        Box::new(FileCheckpointStore::new(&config.output.checkpoint_path)),
        build_sink(&config).unwrap(),
    )
    .with_delay(DelayPolicy::none());

    assert_eq!(orchestrator.run().await.unwrap(), CrawlOutcome::Completed);

    let rows = csv_rows(&dir.path().join("data/data.csv"));
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][2], "+923001111111");
    assert_eq!(orchestrator.stats().listings_discarded, 1);
}
