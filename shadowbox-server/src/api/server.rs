//! `/server` and `/name` — server-wide settings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use shadowbox_types::{DataLimit, ShadowboxError};

use super::error_mapping::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerJson {
    pub name: String,
    pub server_id: String,
    pub metrics_enabled: bool,
    pub created_timestamp_ms: i64,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_data_limit: Option<DataLimit>,
    pub port_for_new_access_keys: u16,
    pub hostname_for_access_keys: String,
}

pub async fn get_server(State(state): State<AppState>) -> Json<ServerJson> {
    let cfg = state.inner.server_config.snapshot().await;
    Json(ServerJson {
        name: cfg.name,
        server_id: cfg.server_id,
        metrics_enabled: cfg.metrics_enabled,
        created_timestamp_ms: cfg.created_timestamp_ms,
        version: cfg.version,
        access_key_data_limit: cfg.access_key_data_limit,
        port_for_new_access_keys: cfg.port_for_new_access_keys,
        hostname_for_access_keys: cfg.hostname,
    })
}

#[derive(Deserialize)]
pub struct NameBody {
    pub name: String,
}

pub async fn set_name(
    State(state): State<AppState>,
    Json(body): Json<NameBody>,
) -> Result<StatusCode, ApiError> {
    state.inner.server_config.set_name(body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct HostnameBody {
    pub hostname: String,
}

pub async fn set_hostname(
    State(state): State<AppState>,
    Json(body): Json<HostnameBody>,
) -> Result<StatusCode, ApiError> {
    state.inner.server_config.set_hostname(body.hostname).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PortBody {
    pub port: i64,
}

pub async fn set_port_for_new_access_keys(
    State(state): State<AppState>,
    Json(body): Json<PortBody>,
) -> Result<StatusCode, ApiError> {
    state.inner.access_keys.set_port_for_new_access_keys(body.port).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct DataLimitBody {
    pub limit: RawDataLimit,
}

#[derive(Deserialize)]
pub struct RawDataLimit {
    pub bytes: i64,
}

impl RawDataLimit {
    pub(crate) fn into_data_limit(self) -> Result<DataLimit, ShadowboxError> {
        if self.bytes < 0 {
            return Err(ShadowboxError::InvalidDataLimit {
                reason: format!("bytes must be non-negative, got {}", self.bytes),
            });
        }
        Ok(DataLimit { bytes: self.bytes as u64 })
    }
}

pub async fn set_default_data_limit(
    State(state): State<AppState>,
    Json(body): Json<DataLimitBody>,
) -> Result<StatusCode, ApiError> {
    let limit = body.limit.into_data_limit()?;
    state.inner.access_keys.set_default_data_limit(limit).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_default_data_limit(
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.inner.access_keys.remove_default_data_limit().await?;
    Ok(StatusCode::NO_CONTENT)
}
