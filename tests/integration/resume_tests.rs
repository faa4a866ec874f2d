//! Interrupt and resume behavior

use crate::support::*;
use catalog_harvester::checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
use catalog_harvester::config::parse_config;
use catalog_harvester::crawler::{resolve_start, CrawlBounds, CrawlOutcome, CrawlPosition, DelayPolicy};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_interrupt_during_wait_keeps_position_before_wait() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, 1, catalog_page(&["/item/1"])).await;
    mount_listing(&server, "/item/1", listing_page("Corolla", Some("+923001111111"))).await;
    Mock::given(method("GET"))
        .and(path("/punjab/cars"))
        .and(query_param("filter", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let config = task_config(&server, dir.path());
    let store = RecordingStore::new(&config.output.checkpoint_path);

    // Long wait between pages; the interrupt arrives right after the first save.
    let mut first_run = orchestrator(&config, &store)
        .with_delay(DelayPolicy::from_millis(30_000, 30_000));
    let on_save = store.on_save.clone();
    let outcome = first_run
        .run_until(async move { on_save.notified().await })
        .await
        .unwrap();

    let expected = CrawlPosition::new(0, 2, 1);
    assert_eq!(outcome, CrawlOutcome::Interrupted(expected));
    assert_eq!(store.positions(), vec![expected, expected]);

    let file_store = FileCheckpointStore::new(&config.output.checkpoint_path);
    assert_eq!(file_store.load().unwrap().unwrap().position, expected);
    let bounds = CrawlBounds::from_config(&config.crawler);
    assert_eq!(resolve_start(&file_store, &bounds, None).unwrap(), expected);

    // The next run continues with filter 2 only.
    let mut second_run = orchestrator(&config, &store).with_delay(DelayPolicy::none());
    assert_eq!(second_run.run().await.unwrap(), CrawlOutcome::Completed);
    assert_eq!(second_run.stats().units_succeeded, 1);
    assert_eq!(csv_rows(&dir.path().join("data/data.csv")).len(), 1);
    assert_eq!(
        file_store.load().unwrap().unwrap().position,
        CrawlPosition::initial()
    );
}

#[tokio::test]
async fn test_interrupt_during_fetch_saves_current_position() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/punjab/cars"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(catalog_page(&[]))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let config = task_config(&server, dir.path());
    let store = RecordingStore::new(&config.output.checkpoint_path);
    let mut orchestrator = orchestrator(&config, &store);

    let outcome = orchestrator
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap();

    assert_eq!(outcome, CrawlOutcome::Interrupted(CrawlPosition::initial()));
    assert_eq!(store.positions(), vec![CrawlPosition::initial()]);
}

#[tokio::test]
async fn test_corrupt_checkpoint_restarts_from_beginning() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    let bounds = CrawlBounds {
        regions: 3,
        max_filter: 11,
        max_page: 3,
    };
    let store = FileCheckpointStore::new(&path);
    assert_eq!(
        resolve_start(&store, &bounds, Some("hash")).unwrap(),
        CrawlPosition::initial()
    );

    store
        .save(&Checkpoint::new(CrawlPosition::new(2, 11, 3), Some("old".to_string())))
        .unwrap();
    assert_eq!(
        resolve_start(&store, &bounds, Some("new")).unwrap(),
        CrawlPosition::new(2, 11, 3)
    );

    let shrunk = CrawlBounds {
        regions: 2,
        ..bounds
    };
    assert_eq!(
        resolve_start(&store, &shrunk, None).unwrap(),
        CrawlPosition::initial()
    );
}

#[test]
fn test_checkpoint_file_is_human_readable() {
    let dir = TempDir::new().unwrap();
    let server_free_config = parse_config(
        &r#"
[crawler]
regions = ["sindh"]
max-filter = 1
max-page = 1
catalog-url-template = "https://catalog.test/{region}?f={filter}&p={page}"

[renderer]
user-agent = "TestHarvester/1.0"
child-link-selector = "a"

[[parser.field]]
name = "phone"
pattern = 'tel:(\d+)'
required = true

[output]
records-path = "@DIR@/data.csv"
checkpoint-path = "@DIR@/state.json"
"#
        .replace("@DIR@", &dir.path().display().to_string()),
    )
    .unwrap();

    let store = FileCheckpointStore::new(&server_free_config.output.checkpoint_path);
    store
        .save(&Checkpoint::new(CrawlPosition::new(0, 1, 1), None))
        .unwrap();

    let text = std::fs::read_to_string(&server_free_config.output.checkpoint_path).unwrap();
    assert!(text.contains("\"regionIndex\": 0"));
    assert!(text.contains("\"filterValue\": 1"));
    assert!(text.contains("\"page\": 1"));
}
