//! `/access-keys` — access-key administration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use shadowbox_types::{AccessKey, DataLimit};

use super::error_mapping::ApiError;
use super::server::RawDataLimit;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyJson {
    pub id: String,
    pub name: String,
    pub password: String,
    pub port: u16,
    pub method: String,
    pub access_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_limit: Option<DataLimit>,
}

fn to_json(key: AccessKey, hostname: &str) -> AccessKeyJson {
    AccessKeyJson {
        access_url: key.access_url(hostname),
        id: key.id,
        name: key.name,
        password: key.password,
        port: key.port,
        method: key.encryption_method,
        data_limit: key.data_limit,
    }
}

#[derive(Serialize)]
pub struct AccessKeysJson {
    pub access_keys: Vec<AccessKeyJson>,
}

pub async fn list_access_keys(State(state): State<AppState>) -> Json<AccessKeysJson> {
    let hostname = state.inner.access_keys.hostname().await;
    let keys = state.inner.access_keys.list_access_keys().await;
    Json(AccessKeysJson {
        access_keys: keys.into_iter().map(|k| to_json(k, &hostname)).collect(),
    })
}

pub async fn create_access_key(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AccessKeyJson>), ApiError> {
    let hostname = state.inner.access_keys.hostname().await;
    let key = state.inner.access_keys.create_new_access_key().await?;
    Ok((StatusCode::CREATED, Json(to_json(key, &hostname))))
}

pub async fn remove_access_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.inner.access_keys.remove_access_key(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct NameBody {
    pub name: String,
}

pub async fn rename_access_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NameBody>,
) -> Result<StatusCode, ApiError> {
    state.inner.access_keys.rename_access_key(&id, body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct DataLimitBody {
    pub limit: RawDataLimit,
}

pub async fn set_access_key_data_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DataLimitBody>,
) -> Result<StatusCode, ApiError> {
    let limit = body.limit.into_data_limit()?;
    state.inner.access_keys.set_access_key_data_limit(&id, limit).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_access_key_data_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.inner.access_keys.remove_access_key_data_limit(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
