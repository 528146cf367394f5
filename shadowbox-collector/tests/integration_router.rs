//! Drives the collector's router end to end via `tower::ServiceExt`,
//! checking that valid reports reach the sink and invalid ones are rejected
//! before touching it, through the actual HTTP/validation path rather than
//! calling handlers directly.

use std::sync::Arc;

use http_body_util::BodyExt;
use shadowbox_collector::router::build_router;
use shadowbox_collector::sink::test_support::InMemorySink;
use shadowbox_collector::state::AppState;
use tower::ServiceExt;

async fn post(router: &axum::Router, uri: &str, body: serde_json::Value) -> axum::http::StatusCode {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    response.status()
}

#[tokio::test]
async fn healthz_is_reachable() {
    let sink = Arc::new(InMemorySink::default());
    let router = build_router(AppState::with_sink(sink));

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn valid_connection_report_is_flattened_into_the_sink() {
    let sink = Arc::new(InMemorySink::default());
    let router = build_router(AppState::with_sink(sink.clone()));

    let status = post(
        &router,
        "/connections",
        serde_json::json!({
            "serverId": "s1",
            "startUtcMs": 0,
            "endUtcMs": 3_600_000,
            "userReports": [
                {"userId": "AA", "countries": ["US"], "bytesTransferred": 11},
            ],
        }),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(sink.connections.lock().await.len(), 1);
}

#[tokio::test]
async fn connection_report_with_inverted_timestamps_is_rejected() {
    let sink = Arc::new(InMemorySink::default());
    let router = build_router(AppState::with_sink(sink.clone()));

    let status = post(
        &router,
        "/connections",
        serde_json::json!({
            "serverId": "s1",
            "startUtcMs": 3_600_000,
            "endUtcMs": 0,
            "userReports": [],
        }),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(sink.connections.lock().await.is_empty());
}

#[tokio::test]
async fn valid_feature_report_is_inserted() {
    let sink = Arc::new(InMemorySink::default());
    let router = build_router(AppState::with_sink(sink.clone()));

    let status = post(
        &router,
        "/features",
        serde_json::json!({
            "serverId": "s1",
            "serverVersion": "1.0.0",
            "timestampUtcMs": 0,
            "dataLimit": {"enabled": true, "perKeyLimitCount": 3},
        }),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(sink.features.lock().await.len(), 1);
}

#[tokio::test]
async fn feature_report_missing_data_limit_enabled_is_rejected() {
    let sink = Arc::new(InMemorySink::default());
    let router = build_router(AppState::with_sink(sink.clone()));

    let status = post(
        &router,
        "/features",
        serde_json::json!({
            "serverId": "s1",
            "serverVersion": "1.0.0",
            "timestampUtcMs": 0,
            "dataLimit": {},
        }),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(sink.features.lock().await.is_empty());
}
