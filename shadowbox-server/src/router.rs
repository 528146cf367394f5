//! Top-level router: the whole API surface nested behind the secret-prefix
//! guard, plus an always-public health check.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::middleware::require_secret_prefix;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let guarded = api::routes()
        .layer(middleware::from_fn_with_state(state.clone(), require_secret_prefix));

    Router::new()
        .merge(guarded)
        .route("/healthz", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
