//! Request engine tests against a mocked Sonar server.
//!
//! Covers credential stamping, error classification, transport failures,
//! deadlines and the three response shapes.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use sonarapi::{
    BasicAuth, BearerAuth, ErrorKind, NoAuth, PasscodeAuth, QueryParams, RequestOptions, SonarClient, SonarError,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Status {
    status: String,
    version: String,
}

fn status_body() -> serde_json::Value {
    serde_json::json!({"id": "20240101", "version": "10.4.1", "status": "UP"})
}

async fn client_for(server: &MockServer) -> SonarClient {
    SonarClient::new(&server.uri(), BearerAuth::new("squ_test").unwrap()).unwrap()
}

// =============================================================================
// Credential providers on the wire
// =============================================================================

#[tokio::test]
async fn test_bearer_token_and_json_content_type_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/status"))
        .and(header("authorization", "Bearer squ_test"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let status: Status = client
        .request("/system/status", RequestOptions::get())
        .await
        .unwrap();

    assert_eq!(status.status, "UP");
    assert_eq!(status.version, "10.4.1");
}

#[tokio::test]
async fn test_basic_credentials_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/status"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = SonarClient::new(&server.uri(), BasicAuth::new("admin", Some("secret")).unwrap()).unwrap();
    let _: Status = client.request("/system/status", RequestOptions::get()).await.unwrap();
}

#[tokio::test]
async fn test_passcode_is_sent_instead_of_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/health"))
        .and(header("x-sonar-passcode", "let-me-in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"health": "GREEN"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = SonarClient::new(&server.uri(), PasscodeAuth::new("let-me-in").unwrap()).unwrap();
    let health: serde_json::Value = client.request("/system/health", RequestOptions::get()).await.unwrap();
    assert_eq!(health["health"], "GREEN");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_no_auth_sends_no_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/server/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json("10.4.1"))
        .mount(&server)
        .await;

    let client = SonarClient::new(&server.uri(), NoAuth).unwrap();
    let version: String = client.request("/server/version", RequestOptions::get()).await.unwrap();
    assert_eq!(version, "10.4.1");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(requests[0].headers.get("x-sonar-passcode").is_none());
}

// =============================================================================
// Request descriptors
// =============================================================================

#[tokio::test]
async fn test_query_and_json_body_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/users-management/users"))
        .and(query_param("dryRun", "true"))
        .and(body_json(serde_json::json!({"login": "jdoe", "name": "Jane"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "u1", "login": "jdoe"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut params = QueryParams::new();
    params.set("dryRun", true);

    let created: serde_json::Value = client
        .request(
            "/v2/users-management/users",
            RequestOptions::post()
                .with_query(&params)
                .with_json(&serde_json::json!({"login": "jdoe", "name": "Jane"}))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(created["id"], "u1");
}

#[tokio::test]
async fn test_empty_success_body_decodes_to_unit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/projects/delete"))
        .and(query_param("project", "old"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut params = QueryParams::new();
    params.set("project", "old");

    client
        .request::<()>("/projects/delete", RequestOptions::post().with_query(&params))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_undecodable_success_body_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .request::<Status>("/system/status", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.status(), Some(200));
}

// =============================================================================
// Error classification
// =============================================================================

async fn error_for(status: u16, body: ResponseTemplate) -> SonarError {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/projects/search"))
        .respond_with(body)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .request::<serde_json::Value>("/projects/search", RequestOptions::get())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(status), "{err:?}");
    err
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let cases = [
        (400, ErrorKind::Validation),
        (401, ErrorKind::Authentication),
        (403, ErrorKind::Authorization),
        (404, ErrorKind::NotFound),
        (429, ErrorKind::RateLimit),
        (500, ErrorKind::Server),
        (502, ErrorKind::Server),
        (409, ErrorKind::Api),
    ];

    for (status, kind) in cases {
        let err = error_for(status, ResponseTemplate::new(status)).await;
        assert_eq!(err.kind(), kind, "status {status}");
    }
}

#[tokio::test]
async fn test_validation_payload_is_parsed() {
    let body = serde_json::json!({
        "errors": [{"msg": "Value of parameter 'ps' (1000) must be less than 500"}]
    });
    let err = error_for(400, ResponseTemplate::new(400).set_body_json(body)).await;

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.to_string(),
        "Validation failed: Value of parameter 'ps' (1000) must be less than 500"
    );
    assert!(err.body().is_some());
}

#[tokio::test]
async fn test_rate_limit_surfaces_retry_hint() {
    let err = error_for(
        429,
        ResponseTemplate::new(429)
            .insert_header("Retry-After", "7")
            .set_body_string("slow down"),
    )
    .await;

    match err {
        SonarError::RateLimit {
            retry_after_secs,
            message,
            ..
        } => {
            assert_eq!(retry_after_secs, Some(7));
            assert_eq!(message, "slow down");
        }
        other => panic!("expected RateLimit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_error_body_falls_back_to_text() {
    let err = error_for(503, ResponseTemplate::new(503).set_body_string("Service Unavailable")).await;
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.to_string().contains("Service Unavailable"));
    assert!(err.body().is_none());
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let client = SonarClient::new(&uri, NoAuth).unwrap();
    let err = client
        .request::<serde_json::Value>("/system/status", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_deadline_is_timeout_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await.with_timeout(Duration::from_millis(100));
    let err = client
        .request::<Status>("/system/status", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_cancellation_is_timeout_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/system/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client
        .request::<Status>("/system/status", RequestOptions::get().with_cancel(token))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}

// =============================================================================
// Binary and streamed bodies
// =============================================================================

#[tokio::test]
async fn test_binary_body_is_returned_verbatim() {
    let server = MockServer::start().await;
    let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>".to_vec();

    Mock::given(method("GET"))
        .and(path("/api/project_badges/measure"))
        .and(query_param("project", "my_project"))
        .and(query_param("metric", "coverage"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(svg.clone(), "image/svg+xml"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let badge = sonarapi::project_badge(&client, "my_project", sonarapi::BadgeMetric::Coverage, None, None)
        .await
        .unwrap();

    assert_eq!(badge, svg);
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn test_stream_reports_progress() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path("/api/regulatory_reports/download"))
        .and(query_param("project", "my_project"))
        .and(query_param("branch", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "application/zip"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let stream = sonarapi::download_regulatory_report(&client, "my_project", Some("main"), None)
        .await
        .unwrap();
    assert_eq!(stream.content_length(), Some(payload.len() as u64));

    let mut last = None;
    let data = stream.collect_with_progress(|p| last = Some(*p)).await.unwrap();

    assert_eq!(data, payload);
    let last = last.expect("at least one chunk");
    assert_eq!(last.loaded, payload.len() as u64);
    assert_eq!(last.total, Some(payload.len() as u64));
    assert_eq!(last.percentage, Some(100.0));
}

#[tokio::test]
async fn test_stream_error_status_is_classified_before_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/regulatory_reports/download"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({"errors": [{"msg": "Insufficient privileges"}]})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = sonarapi::download_regulatory_report(&client, "my_project", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(err.to_string().contains("Insufficient privileges"));
}

#[tokio::test]
async fn test_stream_chunks_are_in_order() {
    let server = MockServer::start().await;
    let payload = vec![7u8; 10_000];

    Mock::given(method("GET"))
        .and(path("/api/regulatory_reports/download"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "application/zip"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut stream = sonarapi::download_regulatory_report(&client, "p", None, None).await.unwrap();

    let mut loaded = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        loaded += chunk.bytes.len() as u64;
        assert_eq!(chunk.progress.loaded, loaded);
    }
    assert_eq!(loaded, 10_000);
}

#[tokio::test]
async fn test_json_body_keeps_content_type_for_binary_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/reports/generate"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"project": "p"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"PK\x03\x04".to_vec(), "application/zip"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let zip = client
        .request_binary(
            "/reports/generate",
            RequestOptions::post()
                .with_json(&serde_json::json!({"project": "p"}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(zip, b"PK\x03\x04");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("accept").is_none());
}

#[tokio::test]
async fn test_binary_body_sends_its_own_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/analysis_reports/submit"))
        .and(header("content-type", "application/zip"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .request::<()>(
            "/analysis_reports/submit",
            RequestOptions::post().with_binary(vec![1, 2, 3], "application/zip"),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_types: Vec<_> = requests[0].headers.get_all("content-type").iter().collect();
    assert_eq!(content_types.len(), 1);
    assert_eq!(requests[0].body, vec![1, 2, 3]);
}
