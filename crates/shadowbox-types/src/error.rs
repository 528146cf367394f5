//! The domain error taxonomy shared by the repository, the supervisors, and
//! the Manager REST Service. Transport-level mapping (HTTP status codes)
//! lives in `shadowbox-server`; this type only describes *what* went wrong.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by core Shadowbox operations.
///
/// Serializes as `{"type": "...", "details": {...}}` so the manager service
/// can forward it verbatim as an API error body without re-encoding.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum ShadowboxError {
    /// No access key with the given id exists.
    #[error("Access key not found: {id}")]
    AccessKeyNotFound { id: String },

    /// A port argument was not an integer in `[1, 65535]`.
    #[error("Invalid port number: {port}")]
    InvalidPortNumber { port: i64 },

    /// The requested port is already held by a process this server does not
    /// own (i.e. not one of its own access keys).
    #[error("Port {port} is already in use by another process")]
    PortUnavailable { port: u16 },

    /// A data limit was missing or negative.
    #[error("Invalid data limit: {reason}")]
    InvalidDataLimit { reason: String },

    /// A hostname failed validation (not a valid DNS hostname or IP literal).
    #[error("Invalid hostname: {hostname}")]
    InvalidHostname { hostname: String },

    /// A display name (server name or access-key name) exceeded the length limit.
    #[error("Invalid name: {name}")]
    InvalidName { name: String },

    /// Reserved for key-import paths: an unsupported encryption cipher.
    #[error("Invalid cipher: {cipher}")]
    InvalidCipher { cipher: String },

    /// The scraper could not be queried. Callers treat this as "no usage
    /// data" rather than propagating failure up to the admin.
    #[error("Scraper error ({kind}): {message}")]
    ScraperError { kind: String, message: String },

    /// A mutation could not be persisted to disk. Fatal for the request that
    /// triggered it; the next mutation attempt will retry the write.
    #[error("Persistence error: {reason}")]
    PersistenceError { reason: String },
}

impl ShadowboxError {
    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::PersistenceError { reason: reason.into() }
    }

    pub fn scraper(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScraperError { kind: kind.into(), message: message.into() }
    }
}

pub type ShadowboxResult<T> = Result<T, ShadowboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_tagged_shape() {
        let err = ShadowboxError::AccessKeyNotFound { id: "7".into() };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "AccessKeyNotFound");
        assert_eq!(json["details"]["id"], "7");
    }
}
