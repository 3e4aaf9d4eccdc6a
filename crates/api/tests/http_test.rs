//! In-process HTTP tests for the protocol surface.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use url::Url;

use openfeeder_api::{router, Analytics, AppState};
use openfeeder_common::{
    AnalyticsProvider, Chunk, ChunkKind, Config, MetadataKind, PageMetadata, ParsedPage,
};
use openfeeder_index::{FileStore, HashEmbedder, Indexer};
use openfeeder_orchestrator::{Pipeline, TombstoneStore, UpdateAction};

struct TestApp {
    app: Router,
    pipeline: Arc<Pipeline>,
    _dir: tempfile::TempDir,
}

fn test_app(site: &str, webhook_secret: Option<&str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let tombstone_path = dir.path().join("tombstones.json");
    let config = Arc::new(Config {
        site_url: Url::parse(site).unwrap(),
        site_name: "example.com".into(),
        site_lang: "en".into(),
        crawl_interval: 3600,
        max_pages: 50,
        port: 8080,
        embedding_model: "all-MiniLM-L6-v2".into(),
        webhook_secret: webhook_secret.map(str::to_string),
        persist_dir: dir.path().join("store"),
        tombstone_path: tombstone_path.clone(),
        analytics_provider: AnalyticsProvider::None,
        analytics_url: String::new(),
        analytics_site_id: String::new(),
        analytics_api_key: String::new(),
    });

    let store = Arc::new(FileStore::in_memory());
    let indexer = Arc::new(Indexer::new(store, Arc::new(HashEmbedder::default())));
    let tombstones = Arc::new(TombstoneStore::load(&tombstone_path));
    let pipeline = Pipeline::new(Arc::clone(&config), indexer, tombstones).unwrap();

    let app = router(AppState {
        config,
        pipeline: Arc::clone(&pipeline),
        analytics: Analytics::disabled(),
    });

    TestApp {
        app,
        pipeline,
        _dir: dir,
    }
}

fn parsed_page(url: &str, text: &str) -> ParsedPage {
    ParsedPage {
        url: url.to_string(),
        title: "Indexed Page".into(),
        author: Some("Author".into()),
        published: Some("2024-06-01T00:00:00Z".into()),
        updated: Some(Utc::now().to_rfc3339()),
        language: "en".into(),
        summary: text.to_string(),
        metadata: PageMetadata::empty(MetadataKind::Page),
        chunks: vec![Chunk::new(text, ChunkKind::Paragraph)],
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn discovery_serves_protocol_document() {
    let harness = test_app("https://example.com", None);
    let (status, headers, body) = get(&harness.app, "/.well-known/openfeeder.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("X-OpenFeeder").unwrap(), "1.0");
    assert!(headers.contains_key(header::ETAG));
    assert!(headers
        .get(header::CACHE_CONTROL)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("max-age=300"));

    assert_eq!(body["version"], "1.0");
    assert_eq!(body["site"]["name"], "example.com");
    assert_eq!(body["site"]["url"], "https://example.com");
    assert_eq!(body["feed"]["endpoint"], "/openfeeder");
    let capabilities = body["capabilities"].as_array().unwrap();
    assert!(capabilities.iter().any(|c| c == "diff-sync"));
    assert!(capabilities.iter().any(|c| c == "search"));
}

#[tokio::test]
async fn cross_origin_reads_are_allowed() {
    let harness = test_app("https://example.com", None);
    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/openfeeder")
                .header(header::ORIGIN, "https://client.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn discovery_honours_if_none_match() {
    let harness = test_app("https://example.com", None);
    let (_, headers, _) = get(&harness.app, "/.well-known/openfeeder.json").await;
    let etag = headers.get(header::ETAG).unwrap().to_str().unwrap();

    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/.well-known/openfeeder.json")
                .header(header::IF_NONE_MATCH, etag)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

// ---------------------------------------------------------------------------
// Index mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_index_returns_one_empty_page() {
    let harness = test_app("https://example.com", None);
    let (status, headers, body) = get(&harness.app, "/openfeeder").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("X-OpenFeeder-Cache").unwrap(), "MISS");
    assert_eq!(body["schema"], "openfeeder/1.0");
    assert_eq!(body["type"], "index");
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_pages"], 1);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_page_and_limit_fall_back_silently() {
    let harness = test_app("https://example.com", None);
    let (status, _, body) = get(&harness.app, "/openfeeder?page=abc&limit=banana").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
}

#[tokio::test]
async fn index_paginates_indexed_pages() {
    let harness = test_app("https://example.com", None);
    for i in 0..3 {
        let mut page = parsed_page(
            &format!("https://example.com/post-{i}"),
            "enough text for one chunk of content",
        );
        page.published = Some(format!("2024-0{}-01T00:00:00Z", i + 1));
        harness.pipeline.indexer().index_page(&page).await.unwrap();
    }

    let (status, _, body) = get(&harness.app, "/openfeeder?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_pages"], 2);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // Published descending.
    assert_eq!(items[0]["url"], "https://example.com/post-2");
}

// ---------------------------------------------------------------------------
// Fetch mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_unknown_page_is_not_found() {
    let harness = test_app("https://example.com", None);
    let (status, _, body) = get(&harness.app, "/openfeeder?url=/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["schema"], "openfeeder/1.0");
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let harness = test_app("https://example.com", None);
    let (status, _, body) = get(&harness.app, "/openfeeder?url=/../../etc/passwd").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_URL");
}

#[tokio::test]
async fn fetch_returns_chunks_and_meta() {
    let harness = test_app("https://example.com", None);
    harness
        .pipeline
        .indexer()
        .index_page(&parsed_page(
            "https://example.com/post",
            "a chunk of indexed page content",
        ))
        .await
        .unwrap();

    let (status, _, body) = get(&harness.app, "/openfeeder?url=/post").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://example.com/post");
    assert_eq!(body["title"], "Indexed Page");
    let chunks = body["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["type"], "paragraph");
    assert!(chunks[0]["relevance"].is_null());
    assert_eq!(body["meta"]["total_chunks"], 1);
    assert_eq!(body["meta"]["returned_chunks"], 1);
    assert_eq!(body["meta"]["cached"], false);
}

// ---------------------------------------------------------------------------
// Search mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_returns_relevance_ordered_chunks() {
    let harness = test_app("https://example.com", None);
    harness
        .pipeline
        .indexer()
        .index_page(&parsed_page(
            "https://example.com/pie",
            "maple syrup pie with a flaky crust",
        ))
        .await
        .unwrap();

    let (status, _, body) = get(
        &harness.app,
        "/openfeeder?q=maple%20syrup%20pie%20with%20a%20flaky%20crust",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://example.com/pie");
    let chunks = body["chunks"].as_array().unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks[0]["relevance"].as_f64().unwrap() > 0.99);
}

#[tokio::test]
async fn high_min_score_filters_to_not_found() {
    let harness = test_app("https://example.com", None);
    harness
        .pipeline
        .indexer()
        .index_page(&parsed_page(
            "https://example.com/pie",
            "maple syrup pie with a flaky crust",
        ))
        .await
        .unwrap();

    let (status, _, body) = get(
        &harness.app,
        "/openfeeder?q=completely%20unrelated%20vocabulary%20entirely&min_score=0.99",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Differential sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_round_trips_through_the_token() {
    let harness = test_app("https://example.com", None);
    harness
        .pipeline
        .indexer()
        .index_page(&parsed_page(
            "https://example.com/post",
            "content present before the first sync",
        ))
        .await
        .unwrap();

    let (status, _, body) = get(&harness.app, "/openfeeder?since=2020-01-01T00:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["openfeeder_version"], "1.0");
    assert_eq!(body["sync"]["counts"]["added"], 1);
    assert_eq!(body["added"].as_array().unwrap().len(), 1);
    assert!(body["updated"].as_array().unwrap().is_empty());
    assert!(body["deleted"].as_array().unwrap().is_empty());

    // Replay with the returned opaque token (percent-encoded, as a
    // well-behaved client would): nothing changed since.
    let token = body["sync"]["sync_token"]
        .as_str()
        .unwrap()
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D");
    let (status, _, body) = get(&harness.app, &format!("/openfeeder?since={token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sync"]["counts"]["added"], 0);
    assert_eq!(body["sync"]["counts"]["updated"], 0);
}

#[tokio::test]
async fn sync_surfaces_deletions() {
    let harness = test_app("https://example.com", None);
    harness
        .pipeline
        .indexer()
        .index_page(&parsed_page(
            "https://example.com/doomed",
            "this page is about to be deleted",
        ))
        .await
        .unwrap();
    harness
        .pipeline
        .apply_update(UpdateAction::Delete, vec!["/doomed".into()])
        .await;

    let (status, _, body) = get(&harness.app, "/openfeeder?since=2020-01-01T00:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    let deleted = body["deleted"].as_array().unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["url"], "https://example.com/doomed");
    assert!(deleted[0]["deleted_at"].is_string());
}

#[tokio::test]
async fn inverted_window_is_invalid() {
    let harness = test_app("https://example.com", None);
    let (status, _, body) = get(
        &harness.app,
        "/openfeeder?since=2025-01-01T00:00:00Z&until=2020-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PARAM");
}

#[tokio::test]
async fn unparseable_since_is_invalid() {
    let harness = test_app("https://example.com", None);
    let (status, _, body) = get(&harness.app, "/openfeeder?since=not-a-date").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PARAM");
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

async fn post_update(app: &Router, body: Value, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/openfeeder/update")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn webhook_requires_bearer_when_secret_is_set() {
    let harness = test_app("https://example.com", Some("s3cret"));
    let request = json!({ "action": "delete", "urls": ["/gone"] });

    let (status, _) = post_update(&harness.app, request.clone(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_update(&harness.app, request.clone(), Some("Bearer wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post_update(&harness.app, request, Some("Bearer s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["processed"], 1);
}

#[tokio::test]
async fn webhook_rejects_empty_urls_and_unknown_actions() {
    let harness = test_app("https://example.com", None);

    let (status, body) =
        post_update(&harness.app, json!({ "action": "upsert", "urls": [] }), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PARAM");

    let (status, body) = post_update(
        &harness.app,
        json!({ "action": "replace", "urls": ["/x"] }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PARAM");
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthz_reports_crawl_state() {
    let harness = test_app("https://example.com", None);
    let (status, headers, body) = get(&harness.app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("X-OpenFeeder").unwrap(), "1.0");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["crawl_running"], false);
    assert_eq!(body["last_crawl"], 0.0);
}

#[tokio::test]
async fn manual_crawl_trigger_acknowledges() {
    // Unroutable site: the background crawl fails quietly after the
    // response is sent.
    let harness = test_app("http://127.0.0.1:9", None);
    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/crawl")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["status"] == "crawl_started" || body["status"] == "already_running");
}

// Resolution of the ?url= parameter is idempotent: feeding a resolved
// absolute URL back in yields the same lookup key.
#[tokio::test]
async fn url_resolution_is_idempotent() {
    let harness = test_app("https://example.com", None);
    harness
        .pipeline
        .indexer()
        .index_page(&parsed_page(
            "https://example.com/post",
            "a chunk of indexed page content",
        ))
        .await
        .unwrap();

    let (status_rel, _, body_rel) = get(&harness.app, "/openfeeder?url=/post").await;
    let (status_abs, _, body_abs) =
        get(&harness.app, "/openfeeder?url=https://example.com/post").await;
    assert_eq!(status_rel, StatusCode::OK);
    assert_eq!(status_abs, StatusCode::OK);
    assert_eq!(body_rel["url"], body_abs["url"]);
}
