//! Tests for the HTTP client module

use super::*;
use crate::error::{Error, ErrorKind};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .token("test-token")
        .github_headers(GITHUB_API_VERSION)
        .build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.base_url.is_none());
    assert!(config.token.is_none());
    assert!(config.user_agent.starts_with("usage-ingest/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.github.com")
        .timeout(Duration::from_secs(60))
        .token("ghp_abc")
        .github_headers("2022-11-28")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.base_url, Some("https://api.github.com".to_string()));
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.token, Some("ghp_abc".to_string()));
    assert_eq!(
        config.default_headers.get("Accept"),
        Some(&GITHUB_ACCEPT.to_string())
    );
    assert_eq!(
        config.default_headers.get("X-GitHub-Api-Version"),
        Some(&"2022-11-28".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("page", "1")
        .query("per_page", "100")
        .header("X-Request-Id", "abc123")
        .timeout(Duration::from_secs(10));

    assert_eq!(
        config.query,
        vec![
            ("page".to_string(), "1".to_string()),
            ("per_page".to_string(), "100".to_string())
        ]
    );
    assert_eq!(
        config.headers.get("X-Request-Id"),
        Some(&"abc123".to_string())
    );
    assert_eq!(config.timeout, Some(Duration::from_secs(10)));
}

#[test]
fn test_build_url() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.github.com/")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(
        client.build_url("/orgs/acme/copilot/usage"),
        "https://api.github.com/orgs/acme/copilot/usage"
    );
    assert_eq!(
        client.build_url("https://other.example.com/x"),
        "https://other.example.com/x"
    );
}

#[tokio::test]
async fn test_request_sends_auth_and_github_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/copilot/usage"))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("Accept", GITHUB_ACCEPT))
        .and(header("X-GitHub-Api-Version", GITHUB_API_VERSION))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .get_with_config("/orgs/acme/copilot/usage", RequestConfig::new().query("page", "1"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_get_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": 42
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let data: serde_json::Value = client.get_json("/api/data").await.unwrap();

    assert_eq!(data["value"], 42);
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/anything").await.unwrap_err();

    assert!(matches!(
        err,
        Error::RateLimited {
            retry_after_seconds: 12
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_403_with_exhausted_budget_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("retry-after", "5"),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/anything").await.unwrap_err();

    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_403_secondary_limit_is_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "1")
                .insert_header("retry-after", "60"),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/anything").await.unwrap_err();

    assert!(matches!(
        err,
        Error::RateLimited {
            retry_after_seconds: 60
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_plain_403_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Copilot not enabled"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/anything").await.unwrap_err();

    match &err {
        Error::HttpStatus { status, body } => {
            assert_eq!(*status, 403);
            assert_eq!(body, "Copilot not enabled");
        }
        other => panic!("Expected HttpStatus, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Permanent);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/anything").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .get_with_config(
            "/slow",
            RequestConfig::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }));
    assert!(err.is_retryable());
}
