use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::warn;

use crate::sink::{iso8601_millis, FeatureRow};
use crate::state::AppState;
use crate::validation::validate_feature_report;

pub async fn post_features(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let report = match validate_feature_report(&body) {
        Ok(report) => report,
        Err(err) => return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": err.0 }))),
    };

    let row = FeatureRow {
        server_id: report.server_id,
        server_version: report.server_version,
        timestamp: iso8601_millis(report.timestamp_utc_ms),
        data_limit_enabled: report.data_limit_enabled,
        per_key_limit_count: report.per_key_limit_count,
    };

    match state.inner.sink.insert_feature(row).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "accepted" }))),
        Err(err) => {
            warn!(%err, "failed to insert feature report");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.0 })))
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sink::test_support::InMemorySink;

    #[tokio::test]
    async fn accepted_report_is_inserted_once() {
        let sink = Arc::new(InMemorySink::default());
        let state = AppState::with_sink(sink.clone());

        let body = serde_json::json!({
            "serverId": "s1",
            "serverVersion": "1.0.0",
            "timestampUtcMs": 0,
            "dataLimit": {"enabled": true, "perKeyLimitCount": 1},
        });
        let (status, _) = post_features(State(state), Json(body)).await;

        assert_eq!(status, StatusCode::OK);
        let rows = sink.features.lock().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].per_key_limit_count, Some(1));
    }

    #[tokio::test]
    async fn rejects_missing_data_limit_enabled() {
        let sink = Arc::new(InMemorySink::default());
        let state = AppState::with_sink(sink.clone());

        let body = serde_json::json!({
            "serverId": "s1",
            "serverVersion": "1.0.0",
            "timestampUtcMs": 0,
            "dataLimit": {},
        });
        let (status, _) = post_features(State(state), Json(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(sink.features.lock().await.is_empty());
    }
}
