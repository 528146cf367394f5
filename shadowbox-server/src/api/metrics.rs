//! `/metrics/*` — transfer totals and the metrics-enabled toggle.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use shadowbox_types::ShadowboxError;
use tracing::warn;

use super::error_mapping::ApiError;
use crate::state::{AppState, METRICS_TRANSFER_HOURS};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJson {
    pub bytes_transferred_by_user_id: std::collections::HashMap<String, u64>,
}

/// No error is listed for this route in the REST contract — a scraper
/// outage reads as "no usage data yet", the same downgrade the enforcement
/// tick applies, rather than a 500.
pub async fn get_transfer_metrics(
    State(state): State<AppState>,
) -> Result<Json<TransferJson>, ApiError> {
    let usage = match state
        .inner
        .usage_reader
        .outbound_bytes_by_access_key(METRICS_TRANSFER_HOURS)
        .await
    {
        Ok(usage) => usage,
        Err(ShadowboxError::ScraperError { kind, message }) => {
            warn!(kind, message, "scraper unavailable, reporting empty transfer metrics");
            HashMap::new()
        },
        Err(other) => return Err(other.into()),
    };
    Ok(Json(TransferJson { bytes_transferred_by_user_id: usage }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEnabledJson {
    pub metrics_enabled: bool,
}

pub async fn get_metrics_enabled(State(state): State<AppState>) -> Json<MetricsEnabledJson> {
    let cfg = state.inner.server_config.snapshot().await;
    Json(MetricsEnabledJson { metrics_enabled: cfg.metrics_enabled })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMetricsEnabledBody {
    pub metrics_enabled: bool,
}

pub async fn set_metrics_enabled(
    State(state): State<AppState>,
    Json(body): Json<SetMetricsEnabledBody>,
) -> Result<StatusCode, ApiError> {
    state.inner.server_config.set_metrics_enabled(body.metrics_enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}
