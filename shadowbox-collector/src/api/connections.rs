use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use tracing::warn;

use crate::sink::{iso8601_millis, ColumnarSink, ConnectionRow};
use crate::state::AppState;
use crate::validation::validate_connection_report;

pub async fn post_connections(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let report = match validate_connection_report(&body) {
        Ok(report) => report,
        Err(err) => return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": err.0 }))),
    };

    let start_timestamp = iso8601_millis(report.start_utc_ms);
    let end_timestamp = iso8601_millis(report.end_utc_ms);

    let rows: Vec<ConnectionRow> = report
        .user_reports
        .into_iter()
        .map(|u| ConnectionRow {
            server_id: report.server_id.clone(),
            start_timestamp: start_timestamp.clone(),
            end_timestamp: end_timestamp.clone(),
            user_id: u.user_id,
            countries: u.countries,
            bytes_transferred: u.bytes_transferred,
            tunnel_time_ms: u.tunnel_time_ms,
        })
        .collect();

    insert_connections(&state.inner.sink, rows).await
}

async fn insert_connections(
    sink: &Arc<dyn ColumnarSink>,
    rows: Vec<ConnectionRow>,
) -> (StatusCode, Json<Value>) {
    match sink.insert_connections(rows).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "accepted" }))),
        Err(err) => {
            warn!(%err, "failed to insert connection report");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.0 })))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::InMemorySink;

    fn valid_body() -> Value {
        serde_json::json!({
            "serverId": "s1",
            "startUtcMs": 0,
            "endUtcMs": 3_600_000,
            "userReports": [
                {"userId": "AA", "countries": ["US"], "bytesTransferred": 11},
                {"userId": "CC", "countries": ["DE"], "bytesTransferred": 22},
            ],
        })
    }

    #[tokio::test]
    async fn accepted_report_flattens_into_one_row_per_user_report() {
        let sink = Arc::new(InMemorySink::default());
        let state = AppState::with_sink(sink.clone());

        let (status, _) = post_connections(State(state), Json(valid_body())).await;
        assert_eq!(status, StatusCode::OK);

        let rows = sink.connections.lock().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].server_id, "s1");
        assert!(rows[0].start_timestamp.starts_with("1970-01-01T00:00:00"));
    }

    #[tokio::test]
    async fn rejects_invalid_body_without_touching_the_sink() {
        let sink = Arc::new(InMemorySink::default());
        let state = AppState::with_sink(sink.clone());

        let mut body = valid_body();
        body["startUtcMs"] = serde_json::json!(4_000_000);
        let (status, _) = post_connections(State(state), Json(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(sink.connections.lock().await.is_empty());
    }
}
