//! Drives the Manager REST Service's router end to end via `tower::ServiceExt`,
//! exercising the secret-prefix guard, the health check, and an access-key
//! create/rename round trip against real handlers and real persisted state.

use http_body_util::BodyExt;
use shadowbox_server::router::build_router;
use shadowbox_server::state::AppState;
use tower::ServiceExt;

const PREFIX: &str = "topsecret";

async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (axum::http::StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    let request = if let Some(body) = body {
        builder = builder.header("content-type", "application/json");
        builder.body(axum::body::Body::from(serde_json::to_vec(&body).unwrap())).unwrap()
    } else {
        builder.body(axum::body::Body::empty()).unwrap()
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn healthz_is_reachable_without_the_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::test_only(dir.path().to_path_buf(), PREFIX.to_string()).await.unwrap();
    let router = build_router(state);

    let (status, _) = send(&router, "GET", "/healthz", None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
}

#[tokio::test]
async fn guarded_routes_404_without_the_prefix_and_succeed_with_it() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::test_only(dir.path().to_path_buf(), PREFIX.to_string()).await.unwrap();
    let router = build_router(state);

    let (status, _) = send(&router, "GET", "/server", None).await;
    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "GET", &format!("/{PREFIX}/server"), None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
}

#[tokio::test]
async fn create_then_rename_access_key_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::test_only(dir.path().to_path_buf(), PREFIX.to_string()).await.unwrap();
    let router = build_router(state);

    let (status, body) = send(&router, "POST", &format!("/{PREFIX}/access-keys"), None).await;
    assert_eq!(status, axum::http::StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &router,
        "PUT",
        &format!("/{PREFIX}/access-keys/{id}/name"),
        Some(serde_json::json!({ "name": "laptop" })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::NO_CONTENT);

    let (status, body) = send(&router, "GET", &format!("/{PREFIX}/access-keys"), None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["accessKeys"][0]["name"], "laptop");
}

#[tokio::test]
async fn renaming_with_an_overlong_name_returns_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::test_only(dir.path().to_path_buf(), PREFIX.to_string()).await.unwrap();
    let router = build_router(state);

    let (_, body) = send(&router, "POST", &format!("/{PREFIX}/access-keys"), None).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        "PUT",
        &format!("/{PREFIX}/access-keys/{id}/name"),
        Some(serde_json::json!({ "name": "x".repeat(101) })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "InvalidName");
}
