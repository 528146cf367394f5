//! Guards every API route behind a secret URL-path prefix.
//!
//! The prefix is compared in constant time over the shorter of the two
//! lengths, then the remaining length/boundary check happens separately —
//! so a mismatched prefix never leaks how many leading bytes matched via
//! response-time variance.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::state::AppState;

pub async fn require_secret_prefix(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let prefix = &state.inner.api_prefix;
    if prefix.is_empty() {
        return Ok(next.run(request).await);
    }

    let path = request.uri().path();
    let Some(rest) = strip_secret_prefix(path, prefix) else {
        return Err(StatusCode::NOT_FOUND);
    };

    let rewritten = format!("{rest}{}", query_suffix(request.uri()));
    if let Ok(uri) = rewritten.parse() {
        *request.uri_mut() = uri;
    }
    Ok(next.run(request).await)
}

fn query_suffix(uri: &axum::http::Uri) -> String {
    uri.query().map(|q| format!("?{q}")).unwrap_or_default()
}

/// If `path` begins with `/` + `prefix` followed by `/` or end-of-string,
/// return the remainder (including the leading `/`). Otherwise `None`.
fn strip_secret_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let path_bytes = path.as_bytes();
    let prefix_bytes = prefix.as_bytes();

    if path_bytes.is_empty() || path_bytes[0] != b'/' {
        return None;
    }
    let candidate = path_bytes.get(1..1 + prefix_bytes.len())?;
    if !bool::from(candidate.ct_eq(prefix_bytes)) {
        return None;
    }

    let boundary = 1 + prefix_bytes.len();
    match path_bytes.get(boundary) {
        None => Some(""),
        Some(b'/') => Some(&path[boundary..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matching_prefix() {
        assert_eq!(strip_secret_prefix("/topsecret/server", "topsecret"), Some("/server"));
        assert_eq!(strip_secret_prefix("/topsecret", "topsecret"), Some(""));
    }

    #[test]
    fn rejects_mismatched_or_partial_prefix() {
        assert_eq!(strip_secret_prefix("/topsecrets/server", "topsecret"), None);
        assert_eq!(strip_secret_prefix("/wrong/server", "topsecret"), None);
        assert_eq!(strip_secret_prefix("server", "topsecret"), None);
    }
}
