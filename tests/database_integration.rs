//! DuckDB-backed pipeline tests
//!
//! Each test works on a database file in a fresh temp directory, so raw
//! pages and usage rows can be checked after the store is closed and reopened.

use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use usage_ingest::config::{StorageConfig, StorageKind};
use usage_ingest::http::GITHUB_API_VERSION;
use usage_ingest::output::{write_usage_parquet, ParquetWriterConfig};
use usage_ingest::{
    DomainStore, DuckDbStore, HttpClient, HttpClientConfig, Pipeline, PipelineState,
    RateLimiterConfig, RawStore, ScopeFingerprint, TaskScope,
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

async fn usage_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/copilot/usage"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "day": "2024-01-02",
                "total_seats": 10,
                "total_active_users": 4,
                "total_suggestions_count": 120,
                "breakdown": [
                    {"language": "rust", "editor": "vscode", "suggestions_count": 100},
                    {"language": "python", "editor": "vscode", "suggestions_count": 20}
                ]
            },
            {"day": "2024-01-03", "total_seats": 10, "total_active_users": 6}
        ])))
        .mount(&server)
        .await;
    server
}

fn pipeline(server: &MockServer, store: &Arc<DuckDbStore>) -> Pipeline {
    Pipeline::new(client_for(server), store.clone(), store.clone())
        .with_rate_limit(RateLimiterConfig::new(1_000, Duration::from_secs(1), 1_000))
}

#[tokio::test]
async fn test_pipeline_persists_across_reopen() {
    let server = usage_server().await;
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("usage.duckdb");
    let scope = TaskScope::new(1, "acme");

    {
        let store = Arc::new(DuckDbStore::open(&db_path).unwrap());
        let report = pipeline(&server, &store).run(&scope).await.unwrap();
        assert_eq!(report.state, PipelineState::Extracted);
        assert_eq!(report.extract.records_extracted, 2);
    }

    let store = DuckDbStore::open(&db_path).unwrap();
    let raw = store.list_all(&ScopeFingerprint::new(1, "acme")).await.unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].page_ordinal, 1);

    let rows = store.list(1, "acme").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(rows[0].total_seats, 10);
    assert_eq!(rows[0].total_suggestions_count, 120);
    let languages = rows[0].language_breakdown.as_ref().unwrap();
    assert_eq!(languages.get("rust").unwrap().suggestions_count, 100);
    let editors = rows[0].editor_breakdown.as_ref().unwrap();
    assert_eq!(editors.get("vscode").unwrap().suggestions_count, 120);
    assert!(rows[1].language_breakdown.is_none());
}

#[tokio::test]
async fn test_extract_only_rebuilds_rows_from_stored_pages() {
    let server = usage_server().await;
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("usage.duckdb");
    let scope = TaskScope::new(1, "acme");

    {
        let store = Arc::new(DuckDbStore::open(&db_path).unwrap());
        pipeline(&server, &store).run(&scope).await.unwrap();
    }
    let requests_before = server.received_requests().await.unwrap().len();

    let store = Arc::new(DuckDbStore::open(&db_path).unwrap());
    let first = store.list(1, "acme").await.unwrap();
    let report = pipeline(&server, &store).extract_only(&scope).await.unwrap();

    assert_eq!(report.state, PipelineState::Extracted);
    assert_eq!(report.extract.records_extracted, 2);
    assert_eq!(store.list(1, "acme").await.unwrap(), first);
    assert_eq!(server.received_requests().await.unwrap().len(), requests_before);
}

#[tokio::test]
async fn test_storage_config_opens_duckdb_and_exports_parquet() {
    let server = usage_server().await;
    let dir = tempdir().unwrap();
    let storage = StorageConfig {
        kind: StorageKind::Duckdb,
        path: Some(dir.path().join("usage.duckdb")),
    };
    let (raw, domain) = storage.open().unwrap();
    let scope = TaskScope::new(1, "acme");

    let mut pipeline = Pipeline::new(client_for(&server), raw, domain.clone())
        .with_rate_limit(RateLimiterConfig::new(1_000, Duration::from_secs(1), 1_000));
    pipeline.run(&scope).await.unwrap();

    let records = domain.list(1, "acme").await.unwrap();
    let out = dir.path().join("usage.parquet");
    let rows = write_usage_parquet(&records, &out, &ParquetWriterConfig::default()).unwrap();
    assert_eq!(rows, 2);

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&out).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let total: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
    assert_eq!(total, 2);
}
