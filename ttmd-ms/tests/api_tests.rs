//! Integration tests for the HTTP API
//!
//! Each test builds the full router over a scratch root folder and an
//! isolated statistics database. Endpoints that would reach external
//! APIs are exercised only on paths that stay local.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`
use ttmd_common::config::MirrorConfig;
use ttmd_ms::services::github_client::GithubClient;
use ttmd_ms::services::ncm_client::NcmClient;
use ttmd_ms::sync::{ProxyCredits, SyncState};
use ttmd_ms::{build_router, AppState};

struct TestApp {
    _root: tempfile::TempDir,
    app: axum::Router,
    db: SqlitePool,
    config: Arc<MirrorConfig>,
}

fn test_config(root: &Path) -> MirrorConfig {
    MirrorConfig {
        root_folder: root.to_path_buf(),
        origin_url: "https://github.com/Steve-xmh/amll-ttml-db.git".to_string(),
        repo_user: "Steve-xmh".to_string(),
        repo_name: "amll-ttml-db".to_string(),
        default_branch: "main".to_string(),
        mirrors: vec!["https://a/".to_string(), "https://b/".to_string()],
        update_interval: Duration::from_secs(600),
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

async fn setup() -> TestApp {
    setup_with_credits(ProxyCredits::new()).await
}

async fn setup_with_credits(credits: ProxyCredits) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(root.path()));

    let db = ttmd_common::db::init_database_pool(&config.database_path())
        .await
        .unwrap();

    let state = AppState::new(
        db.clone(),
        config.clone(),
        SyncState::new(credits),
        Arc::new(NcmClient::new().unwrap()),
        Arc::new(GithubClient::new().unwrap()),
    );

    TestApp {
        _root: root,
        app: build_router(state),
        db,
        config,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn make_mirror(config: &MirrorConfig) {
    let mirror = config.mirror_dir();
    std::fs::create_dir_all(mirror.join("ncm-lyrics")).unwrap();
    std::fs::write(
        mirror.join("ncm-lyrics/12345.ttml"),
        "<tt>lyric body</tt>",
    )
    .unwrap();
    std::fs::write(mirror.join("README.md"), "# mirror").unwrap();
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_module_and_version() {
    let t = setup().await;
    let response = t.app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ttmd-ms");
    assert!(body["version"].is_string());
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn status_before_first_pass_reads_not_available() {
    let mut credits = ProxyCredits::new();
    credits.insert("https://a/".to_string(), 2);
    credits.insert("https://b/".to_string(), 5);
    let t = setup_with_credits(credits).await;

    let response = t.app.oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["last_update_time"], "N/A");
    assert_eq!(body["last_update_status"], "N/A");
    assert_eq!(body["ncm_count"], 0);
    assert_eq!(body["not_found_count"], 0);
    assert_eq!(body["no_lyrics_count"], 0);
    assert_eq!(body["dir_size_mb"], "0.00 MB");
    // Sorted by credit, highest first
    assert_eq!(body["proxy_status"][0][0], "https://b/");
    assert_eq!(body["proxy_status"][0][1], 5);
    assert_eq!(body["proxy_status"][1][0], "https://a/");
}

// =============================================================================
// Mirror browsing
// =============================================================================

#[tokio::test]
async fn browsing_before_clone_is_service_unavailable() {
    let t = setup().await;
    let response = t.app.oneshot(get("/api/db/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn directory_listing_is_sorted_json() {
    let t = setup().await;
    make_mirror(&t.config);

    let response = t.app.oneshot(get("/api/db/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["path"], "");
    assert_eq!(body["dirs"], serde_json::json!(["ncm-lyrics"]));
    assert_eq!(body["files"], serde_json::json!(["README.md"]));
}

#[tokio::test]
async fn lyric_files_are_served_and_recorded() {
    let t = setup().await;
    make_mirror(&t.config);

    let response = t
        .app
        .oneshot(get("/api/db/ncm-lyrics/12345.ttml"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/xml"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<tt>lyric body</tt>");

    let hits: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM ncm_access_log WHERE song_id = '12345'")
            .fetch_one(&t.db)
            .await
            .unwrap();
    assert_eq!(hits, 1);
}

#[tokio::test]
async fn missing_paths_are_recorded_as_not_found() {
    let t = setup().await;
    make_mirror(&t.config);

    let response = t.app.oneshot(get("/api/db/no/such/file.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let count: i64 =
        sqlx::query_scalar("SELECT count FROM not_found WHERE path = 'no/such/file.txt'")
            .fetch_one(&t.db)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn traversal_outside_the_mirror_is_forbidden() {
    let t = setup().await;
    make_mirror(&t.config);
    std::fs::write(t.config.root_folder.join("secret.txt"), "secret").unwrap();

    let response = t
        .app
        .oneshot(get("/api/db/%2e%2e/secret.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Statistics endpoints
// =============================================================================

#[tokio::test]
async fn ranking_is_empty_without_traffic() {
    let t = setup().await;
    let response = t.app.oneshot(get("/api/ncm")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response.into_body()).await, serde_json::json!([]));
}

#[tokio::test]
async fn ranking_joins_cached_metadata() {
    let t = setup().await;
    make_mirror(&t.config);

    // Serve the lyric twice, with metadata already cached so the
    // handler never goes to the network
    ttmd_ms::db::songs::upsert_one(&t.db, "12345", "Song", "Artist", "Album")
        .await
        .unwrap();
    for _ in 0..2 {
        let response = t
            .app
            .clone()
            .oneshot(get("/api/db/ncm-lyrics/12345.ttml"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = t.app.oneshot(get("/api/ncm")).await.unwrap();
    let body = json_body(response.into_body()).await;
    assert_eq!(body[0]["song_id"], "12345");
    assert_eq!(body[0]["access_count"], 2);
    assert_eq!(body[0]["song_name"], "Song");
    assert_eq!(body[0]["artists"], "Artist");
}

#[tokio::test]
async fn dashboard_defaults_to_today() {
    let t = setup().await;
    let response = t.app.oneshot(get("/api/ncm/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["stats"]["acquired"], 0);
    assert_eq!(body["stats"]["no_lyrics"], 0);
    assert_eq!(body["hot_songs"], serde_json::json!([]));
}

#[tokio::test]
async fn no_lyrics_listing_is_empty_initially() {
    let t = setup().await;
    let response = t.app.oneshot(get("/api/ncm/no-lyrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response.into_body()).await, serde_json::json!([]));
}

// =============================================================================
// Table viewer
// =============================================================================

#[tokio::test]
async fn table_viewer_returns_paginated_rows() {
    let t = setup().await;
    ttmd_ms::db::stats::record_access(&t.db, "1").await.unwrap();

    let response = t
        .app
        .oneshot(get("/api/table/ncm_access_log?page=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["table_name"], "ncm_access_log");
    assert_eq!(body["total_rows"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 100);
    assert!(body["columns"]
        .as_array()
        .unwrap()
        .contains(&Value::String("song_id".to_string())));
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn table_viewer_rejects_unknown_tables() {
    let t = setup().await;
    let response = t.app.oneshot(get("/api/table/sqlite_master")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn table_viewer_rejects_unknown_sort_columns() {
    let t = setup().await;
    let response = t
        .app
        .oneshot(get("/api/table/not_found?sort=nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Log tail
// =============================================================================

#[tokio::test]
async fn log_endpoint_survives_a_missing_file() {
    let t = setup().await;
    let response = t.app.oneshot(get("/api/log")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["log_content"], "log file not found");
}

#[tokio::test]
async fn log_endpoint_serves_the_file_tail() {
    let t = setup().await;
    std::fs::write(t.config.log_path(), "line one\nline two\n").unwrap();

    let response = t.app.oneshot(get("/api/log")).await.unwrap();
    let body = json_body(response.into_body()).await;
    assert_eq!(body["log_content"], "line one\nline two");
}

// =============================================================================
// Contributors
// =============================================================================

#[tokio::test]
async fn contributors_require_the_mirrored_data_file() {
    let t = setup().await;
    make_mirror(&t.config);

    let response = t.app.oneshot(get("/api/contributors")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contributors_are_served_from_a_fresh_cache() {
    let t = setup().await;
    make_mirror(&t.config);

    let metadata_dir = t.config.mirror_dir().join("metadata");
    std::fs::create_dir_all(&metadata_dir).unwrap();
    std::fs::write(
        metadata_dir.join("contributors.jsonl"),
        "{\"githubId\": 100, \"count\": 7}\n",
    )
    .unwrap();

    // Fresh cache entry, so the handler never calls the GitHub API
    let mut cached = std::collections::HashMap::new();
    cached.insert(
        "100".to_string(),
        ttmd_ms::db::contributors::ContributorInfo {
            login: Some("octocat".to_string()),
            name: Some("The Octocat".to_string()),
            avatar_url: Some("https://example.com/a.png".to_string()),
            last_updated: None,
        },
    );
    ttmd_ms::db::contributors::upsert_contributors(&t.db, &cached)
        .await
        .unwrap();

    let response = t.app.oneshot(get("/api/contributors")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["rate_limited"], false);
    assert_eq!(body["contributors"][0]["login"], "octocat");
    assert_eq!(body["contributors"][0]["count"], 7);
}
