pub mod connections;
pub mod features;

use axum::routing::post;
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/connections", post(connections::post_connections))
        .route("/features", post(features::post_features))
}
