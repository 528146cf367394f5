//! Maps `ShadowboxError` onto the HTTP status codes the REST surface
//! promises, with the error itself as the JSON body so admins see the same
//! tagged shape the core emits.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shadowbox_types::ShadowboxError;

pub struct ApiError(pub ShadowboxError);

impl From<ShadowboxError> for ApiError {
    fn from(err: ShadowboxError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ShadowboxError::AccessKeyNotFound { .. } => StatusCode::NOT_FOUND,
            ShadowboxError::InvalidPortNumber { .. }
            | ShadowboxError::InvalidDataLimit { .. }
            | ShadowboxError::InvalidHostname { .. }
            | ShadowboxError::InvalidName { .. }
            | ShadowboxError::InvalidCipher { .. } => StatusCode::BAD_REQUEST,
            ShadowboxError::PortUnavailable { .. } => StatusCode::CONFLICT,
            // Never expected to reach the REST layer — enforcement downgrades
            // this to empty usage before it gets here. Mapped defensively.
            ShadowboxError::ScraperError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ShadowboxError::PersistenceError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.0)).into_response()
    }
}
