pub mod access_keys;
pub mod error_mapping;
pub mod metrics;
pub mod server;

use axum::routing::{delete, get, put};
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/server", get(server::get_server))
        .route("/name", put(server::set_name))
        .route("/server/hostname-for-access-keys", put(server::set_hostname))
        .route("/server/port-for-new-access-keys", put(server::set_port_for_new_access_keys))
        .route(
            "/server/access-key-data-limit",
            put(server::set_default_data_limit).delete(server::remove_default_data_limit),
        )
        .route("/access-keys", get(access_keys::list_access_keys).post(access_keys::create_access_key))
        .route("/access-keys/:id", delete(access_keys::remove_access_key))
        .route("/access-keys/:id/name", put(access_keys::rename_access_key))
        .route(
            "/access-keys/:id/data-limit",
            put(access_keys::set_access_key_data_limit).delete(access_keys::remove_access_key_data_limit),
        )
        .route("/metrics/transfer", get(metrics::get_transfer_metrics))
        .route(
            "/metrics/enabled",
            get(metrics::get_metrics_enabled).put(metrics::set_metrics_enabled),
        )
}
