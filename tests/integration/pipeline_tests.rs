//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to serve a small paginated listing and run the
//! full discover → list → extract → persist → image cycle end-to-end.

use reel_harvest::config::{
    Config, FetcherConfig, OutputConfig, PipelineConfig, SiteProfile, SourceConfig,
};
use reel_harvest::crawler::{run_harvest, Coordinator};
use reel_harvest::storage::{RecordStore, RunStatus, SqliteStorage};
use reel_harvest::{record_id, HarvestError, RunPhase};
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(root_url: String, dir: &TempDir) -> Config {
    Config {
        source: SourceConfig {
            root_url,
            page_limit: None,
        },
        fetcher: FetcherConfig {
            politeness_interval_ms: 5, // Very short for testing
            max_attempts: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            ..FetcherConfig::default()
        },
        pipeline: PipelineConfig {
            workers: 2,
            persist_attempts: 2,
        },
        output: OutputConfig {
            database_path: dir.path().join("harvest.db").to_string_lossy().into_owned(),
            image_dir: dir.path().join("images").to_string_lossy().into_owned(),
        },
        selectors: SiteProfile::default(),
    }
}

fn listing_page(base: &str, subjects: &[u32], paginator: bool) -> String {
    let items: String = subjects
        .iter()
        .map(|id| {
            format!(
                r#"<li><div class="item">
                    <div class="pic"><em>{id}</em><a href="{base}/subject/{id}/"><img src="{base}/thumb/{id}.jpg"/></a></div>
                    <div class="info"><span class="title">Title {id}</span></div>
                </div></li>"#,
                id = id,
                base = base
            )
        })
        .collect();

    let paginator = if paginator {
        r#"<div class="paginator">
            <span class="thispage">1</span>
            <a href="/top250/p2">2</a>
            <span class="next"><a href="/top250/p2">后页&gt;</a></span>
        </div>"#
    } else {
        ""
    };

    format!(
        r#"<html><body><ol class="grid_view">{}</ol>{}</body></html>"#,
        items, paginator
    )
}

fn detail_page(rank: u32, name: &str, image_url: Option<String>) -> String {
    let image = image_url
        .map(|src| format!(r#"<div id="mainpic"><img src="{}"/></div>"#, src))
        .unwrap_or_default();

    format!(
        r#"<html><body>
        <div class="top250"><span class="top250-no">No.{rank}</span></div>
        <h1><span property="v:itemreviewed">{name}</span></h1>
        {image}
        <div id="info">
            <span><span class='pl'>导演</span>: <span class='attrs'><a href="/c/1/">Director {rank}</a></span></span><br/>
            <span><span class='pl'>编剧</span>: <span class='attrs'><a href="/c/2/">Writer A</a> / <a href="/c/3/">Writer B</a></span></span><br/>
            <span class="actor"><span class='pl'>主演</span>: <span class='attrs'><a href="/c/4/">Actor {rank}</a></span></span><br/>
            <span class="pl">类型:</span> <span property="v:genre">剧情</span><br/>
            <span class="pl">制片国家/地区:</span> 美国<br/>
            <span class="pl">上映日期:</span> <span property="v:initialReleaseDate">1994-09-10</span><br/>
        </div>
        <strong class="ll rating_num" property="v:average">9.{rank}</strong>
        </body></html>"#,
        rank = rank,
        name = name,
        image = image
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Image that must be downloaded exactly once per server
async fn mount_image(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8, 0xD8, 0xFF, 0xD9]))
        .expect(1)
        .mount(server)
        .await;
}

/// Serves two listing pages with one title each, both with cover images
async fn mount_two_page_site(server: &MockServer) {
    let base = server.uri();
    mount_html(server, "/top250", listing_page(&base, &[1], true)).await;
    mount_html(server, "/top250/p2", listing_page(&base, &[2], false)).await;
    mount_html(
        server,
        "/subject/1/",
        detail_page(1, "The Shawshank Redemption", Some(format!("{}/img/p1.jpg", base))),
    )
    .await;
    mount_html(
        server,
        "/subject/2/",
        detail_page(2, "Farewell My Concubine", Some(format!("{}/img/p2.jpg", base))),
    )
    .await;
    mount_image(server, "/img/p1.jpg").await;
    mount_image(server, "/img/p2.jpg").await;
}

fn open_storage(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&dir.path().join("harvest.db")).expect("Failed to open database")
}

fn image_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join("images").join(format!("{}.jpg", record_id(name)))
}

#[tokio::test]
async fn test_full_harvest_two_pages() {
    let server = MockServer::start().await;
    mount_two_page_site(&server).await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{}/top250", server.uri()), &dir);

    let summary = run_harvest(config, "test-hash".to_string(), CancellationToken::new())
        .await
        .expect("Harvest should succeed");

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.detail_links, 2);
    assert_eq!(summary.persisted, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.assets_stored, 2);
    assert!(!summary.cancelled);

    let storage = open_storage(&dir);
    let records = storage.list_records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].rank, 1);
    assert_eq!(records[0].name, "The Shawshank Redemption");
    assert_eq!(records[0].id, record_id("The Shawshank Redemption"));
    assert_eq!(records[0].writers, "Writer A / Writer B");
    assert_eq!(records[0].country, "美国");
    assert_eq!(records[1].rank, 2);
    assert_eq!(records[1].rating, "9.2");

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.summary.persisted, 2);

    assert!(image_path(&dir, "The Shawshank Redemption").exists());
    assert!(image_path(&dir, "Farewell My Concubine").exists());
}

/// Runs the two-page site on a fresh server with the given pool size
async fn harvest_two_page_site_with_workers(workers: usize) {
    let server = MockServer::start().await;
    mount_two_page_site(&server).await;

    let dir = tempdir().unwrap();
    let mut config = create_test_config(format!("{}/top250", server.uri()), &dir);
    config.pipeline.workers = workers;

    let summary = run_harvest(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.persisted, 2, "workers = {}", workers);
    assert_eq!(summary.assets_stored, 2, "workers = {}", workers);
    assert_eq!(open_storage(&dir).count_records().unwrap(), 2);
    assert!(image_path(&dir, "The Shawshank Redemption").exists());
    assert!(image_path(&dir, "Farewell My Concubine").exists());

    // Each image mock expects exactly one download
    server.verify().await;
}

#[tokio::test]
async fn test_result_does_not_depend_on_worker_count() {
    harvest_two_page_site_with_workers(1).await;
    harvest_two_page_site_with_workers(8).await;
}

#[tokio::test]
async fn test_zero_workers_is_rejected_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let mut config = create_test_config(format!("{}/top250", server.uri()), &dir);
    config.pipeline.workers = 0;

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        run_harvest(config, "hash".to_string(), CancellationToken::new()),
    )
    .await
    .expect("Harvest must not hang");

    assert!(matches!(result, Err(HarvestError::Config(_))));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    // Each image must be downloaded exactly once across both runs
    mount_two_page_site(&server).await;

    let dir = tempdir().unwrap();
    let root = format!("{}/top250", server.uri());

    let first = run_harvest(
        create_test_config(root.clone(), &dir),
        "hash".to_string(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let first_time = open_storage(&dir)
        .get_record(&record_id("The Shawshank Redemption"))
        .unwrap()
        .unwrap()
        .update_time;

    let second = run_harvest(
        create_test_config(root, &dir),
        "hash".to_string(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(first.persisted, 2);
    assert_eq!(second.persisted, 2);
    assert_eq!(second.assets_stored, 0);
    assert_eq!(second.assets_cached, 2);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 2);
    let refreshed = storage
        .get_record(&record_id("The Shawshank Redemption"))
        .unwrap()
        .unwrap();
    assert!(refreshed.update_time > first_time);
}

#[tokio::test]
async fn test_missing_paginator_fails_run() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/top250", listing_page(&base, &[1], false)).await;

    Mock::given(method("GET"))
        .and(path("/subject/1/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{}/top250", base), &dir);
    let mut coordinator =
        Coordinator::new(config, "hash".to_string(), CancellationToken::new()).unwrap();

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, HarvestError::Extraction(_)));
    assert_eq!(coordinator.phase(), RunPhase::Failed);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 0);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test]
async fn test_bad_detail_pages_do_not_abort_run() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/top250", listing_page(&base, &[1, 2], true)).await;
    mount_html(&server, "/top250/p2", listing_page(&base, &[3], false)).await;

    // 1: fine, no image
    mount_html(&server, "/subject/1/", detail_page(1, "Good Title", None)).await;
    // 2: no name element
    mount_html(
        &server,
        "/subject/2/",
        r#"<html><body><span class="top250-no">No.2</span></body></html>"#.to_string(),
    )
    .await;
    // 3: gone
    Mock::given(method("GET"))
        .and(path("/subject/3/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{}/top250", base), &dir);
    let summary = run_harvest(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.detail_links, 3);
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed(), 3);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 1);
    assert!(storage.get_record(&record_id("Good Title")).unwrap().is_some());
}

#[tokio::test]
async fn test_image_failure_keeps_record() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/top250", listing_page(&base, &[1], true)).await;
    mount_html(&server, "/top250/p2", listing_page(&base, &[], false)).await;
    mount_html(
        &server,
        "/subject/1/",
        detail_page(1, "Broken Cover", Some(format!("{}/img/missing.jpg", base))),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/img/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{}/top250", base), &dir);
    let summary = run_harvest(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.assets_failed, 1);
    assert!(open_storage(&dir)
        .get_record(&record_id("Broken Cover"))
        .unwrap()
        .is_some());
    assert!(!image_path(&dir, "Broken Cover").exists());
}

#[tokio::test]
async fn test_page_limit_skips_later_pages() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/top250", listing_page(&base, &[1], true)).await;
    mount_html(&server, "/subject/1/", detail_page(1, "Only Title", None)).await;
    Mock::given(method("GET"))
        .and(path("/top250/p2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let mut config = create_test_config(format!("{}/top250", base), &dir);
    config.source.page_limit = Some(1);

    let summary = run_harvest(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.persisted, 1);
}

#[tokio::test]
async fn test_listing_page_failure_is_counted() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/top250", listing_page(&base, &[1], true)).await;
    mount_html(&server, "/subject/1/", detail_page(1, "Survivor", None)).await;
    Mock::given(method("GET"))
        .and(path("/top250/p2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{}/top250", base), &dir);
    let summary = run_harvest(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.listing_failures, 1);
    assert_eq!(summary.persisted, 1);
}

#[tokio::test]
async fn test_cancelled_run_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{}/top250", server.uri()), &dir);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_harvest(config, "hash".to_string(), cancel).await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.processed(), 0);

    let storage = open_storage(&dir);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
    assert_eq!(storage.count_records().unwrap(), 0);
}
