//! End-to-end tests against a mock usage API
//!
//! These tests drive the public API only: a wiremock server stands in for
//! the usage endpoint and an in-memory store holds both raw and domain data.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use usage_ingest::http::GITHUB_API_VERSION;
use usage_ingest::{
    Collector, CollectorConfig, DomainStore, ErrorKind, Extractor, HttpClient, HttpClientConfig,
    MemoryStore, Pipeline, PipelineState, RateLimiter, RateLimiterConfig, RawStore,
    ScopeFingerprint, TaskScope,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(server.uri())
            .token("test-token")
            .github_headers(GITHUB_API_VERSION)
            .build(),
    )
    .unwrap()
}

fn fast_limits() -> RateLimiterConfig {
    RateLimiterConfig::new(10_000, Duration::from_secs(1), 10_000)
}

fn day_items(first: u32, count: u32) -> Value {
    Value::Array(
        (first..first + count)
            .map(|d| {
                json!({
                    "day": format!("2024-02-{d:02}"),
                    "total_seats": 20,
                    "total_active_users": d,
                    "breakdown": [
                        {"language": "rust", "editor": "vscode", "suggestions_count": d},
                        {"language": "go", "editor": "jetbrains", "suggestions_count": 1}
                    ]
                })
            })
            .collect(),
    )
}

async fn mount_page(server: &MockServer, org: &str, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{org}/copilot/usage")))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_end_to_end_single_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/copilot/usage"))
        .and(query_param("since", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"day": "2024-01-02", "total_seats": 10, "total_active_users": 4}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let scope =
        TaskScope::new(1, "acme").with_since(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    let mut pipeline = Pipeline::new(client_for(&server), store.clone(), store.clone())
        .with_rate_limit(fast_limits());

    let report = pipeline.run(&scope).await.unwrap();
    assert_eq!(report.state, PipelineState::Extracted);

    let raw = store.list_all(&ScopeFingerprint::new(1, "acme")).await.unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].page_ordinal, 1);

    let rows = store.list(1, "acme").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(rows[0].total_seats, 10);
    assert_eq!(rows[0].total_active_users, 4);
}

#[tokio::test]
async fn test_pagination_terminates_after_short_page() {
    let server = MockServer::start().await;
    mount_page(&server, "acme", 1, day_items(1, 3)).await;
    mount_page(&server, "acme", 2, day_items(4, 3)).await;
    mount_page(&server, "acme", 3, day_items(7, 3)).await;
    mount_page(&server, "acme", 4, day_items(10, 2)).await;

    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(client_for(&server), store.clone(), store.clone())
        .with_rate_limit(fast_limits())
        .with_collector_config(CollectorConfig::default().with_page_size(3));

    let report = pipeline.run(&TaskScope::new(1, "acme")).await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    assert_eq!(report.collect.unwrap().raw_records_written, 4);
    assert_eq!(report.extract.records_extracted, 11);
    assert_eq!(store.list(1, "acme").await.unwrap().len(), 11);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, "acme", 1, day_items(1, 2)).await;
    mount_page(&server, "acme", 2, day_items(3, 1)).await;

    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(client_for(&server), store.clone(), store.clone())
        .with_rate_limit(fast_limits())
        .with_collector_config(CollectorConfig::default().with_page_size(2));
    let scope = TaskScope::new(1, "acme");

    pipeline.run(&scope).await.unwrap();
    let raw_after_first = store.raw_len().await;
    let rows_after_first = store.list(1, "acme").await.unwrap();

    pipeline.run(&scope).await.unwrap();

    assert_eq!(store.raw_len().await, raw_after_first);
    assert_eq!(store.list(1, "acme").await.unwrap(), rows_after_first);
    assert_eq!(rows_after_first.len(), 3);
}

#[tokio::test]
async fn test_concurrent_scopes_are_isolated() {
    let server = MockServer::start().await;
    mount_page(&server, "acme", 1, day_items(1, 2)).await;
    mount_page(&server, "globex", 1, day_items(10, 1)).await;

    let store = Arc::new(MemoryStore::new());
    let client = client_for(&server);
    let limiter = RateLimiter::new(&fast_limits());
    let collector = Collector::new(client, limiter, store.clone());

    let acme = TaskScope::new(1, "acme");
    let globex = TaskScope::new(2, "globex");
    let (a, b) = tokio::join!(collector.run(&acme), collector.run(&globex));
    a.unwrap();
    b.unwrap();

    let extractor = Extractor::new(store.clone(), store.clone());
    extractor.run(&acme).await.unwrap();
    extractor.run(&globex).await.unwrap();

    let acme_rows = store.list(1, "acme").await.unwrap();
    let globex_rows = store.list(2, "globex").await.unwrap();
    assert_eq!(acme_rows.len(), 2);
    assert_eq!(globex_rows.len(), 1);
    assert!(acme_rows.iter().all(|r| r.resource_id == "acme"));
    assert_eq!(globex_rows[0].day, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
    assert!(store.list(1, "globex").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_extraction_makes_no_network_calls() {
    let server = MockServer::start().await;
    mount_page(&server, "acme", 1, day_items(1, 2)).await;

    let store = Arc::new(MemoryStore::new());
    let client = client_for(&server);
    let scope = TaskScope::new(1, "acme");

    Collector::new(client.clone(), RateLimiter::new(&fast_limits()), store.clone())
        .run(&scope)
        .await
        .unwrap();
    let requests_after_collect = client.request_count();
    let received_after_collect = server.received_requests().await.unwrap().len();

    Extractor::new(store.clone(), store.clone())
        .run(&scope)
        .await
        .unwrap();

    assert_eq!(client.request_count(), requests_after_collect);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        received_after_collect
    );
}

#[tokio::test]
async fn test_partial_failure_skips_only_bad_items() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "acme",
        1,
        json!([
            {"day": "2024-03-01", "total_seats": 1},
            {"day": "2024-03-02", "total_seats": 2},
            {"total_seats": 99},
            {"day": "2024-03-03", "total_seats": 3}
        ]),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(client_for(&server), store.clone(), store.clone())
        .with_rate_limit(fast_limits());

    let report = pipeline.run(&TaskScope::new(1, "acme")).await.unwrap();

    assert_eq!(report.state, PipelineState::Extracted);
    assert_eq!(report.extract.records_extracted, 3);
    assert_eq!(report.extract.items_skipped, 1);
    let seats: Vec<i64> = store
        .list(1, "acme")
        .await
        .unwrap()
        .iter()
        .map(|r| r.total_seats)
        .collect();
    assert_eq!(seats, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_breakdowns_are_split_by_dimension() {
    let server = MockServer::start().await;
    mount_page(&server, "acme", 1, day_items(5, 1)).await;

    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(client_for(&server), store.clone(), store.clone())
        .with_rate_limit(fast_limits());
    pipeline.run(&TaskScope::new(1, "acme")).await.unwrap();

    let row = &store.list(1, "acme").await.unwrap()[0];
    let languages = row.language_breakdown.as_ref().unwrap();
    let editors = row.editor_breakdown.as_ref().unwrap();
    assert_eq!(languages.get("rust").unwrap().suggestions_count, 5);
    assert_eq!(languages.get("go").unwrap().suggestions_count, 1);
    assert_eq!(editors.get("vscode").unwrap().suggestions_count, 5);
    assert_eq!(editors.get("jetbrains").unwrap().suggestions_count, 1);
}

#[tokio::test]
async fn test_throttled_collection_is_transient_and_keeps_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "acme", 1, day_items(1, 2)).await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "0"),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(client_for(&server), store.clone(), store.clone())
        .with_rate_limit(fast_limits())
        .with_collector_config(CollectorConfig::default().with_page_size(2));

    let err = pipeline.run(&TaskScope::new(1, "acme")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(
        pipeline.state(),
        PipelineState::CollectionFailed(ErrorKind::Transient)
    );
    assert_eq!(store.raw_len().await, 1);
    assert_eq!(store.domain_len().await, 0);
}

#[tokio::test]
async fn test_rate_limit_holds_two_per_window() {
    let server = MockServer::start().await;
    for page in 1..=5 {
        mount_page(&server, "acme", page, day_items(page, 1)).await;
    }

    // 2 per 300ms over 5 pages: grants at about 0, 0, 300, 300 and 600ms
    let window = Duration::from_millis(300);
    let limits = RateLimiterConfig::new(2, window, 2);
    let store = Arc::new(MemoryStore::new());
    let collector = Collector::new(client_for(&server), RateLimiter::new(&limits), store.clone())
        .with_config(CollectorConfig::default().with_page_size(1).with_max_pages(5));

    let start = Instant::now();
    collector.run(&TaskScope::new(1, "acme")).await.unwrap();

    assert!(start.elapsed() >= window * 2);
    assert_eq!(store.raw_len().await, 5);
}

#[tokio::test]
async fn test_rate_limit_grants_first_two_then_spaces() {
    let window = Duration::from_millis(300);
    let limiter = RateLimiter::new(&RateLimiterConfig::new(2, window, 2));

    let start = Instant::now();
    let mut stamps = Vec::new();
    for _ in 0..5 {
        limiter.acquire().await;
        stamps.push(start.elapsed());
    }

    assert!(stamps[1] < Duration::from_millis(50), "{stamps:?}");
    // Any interval a little shorter than the window holds at most 2 grants
    let span = window - Duration::from_millis(20);
    for (i, first) in stamps.iter().enumerate() {
        let inside = stamps[i..].iter().filter(|s| **s - *first < span).count();
        assert!(inside <= 2, "{stamps:?}");
    }
}
