//! Infrastructure-facing errors encountered by the access-key repository,
//! process supervisors, and metrics pipeline.
//!
//! Domain errors live in [`shadowbox_types::ShadowboxError`] and are what
//! callers above the core ever see; this type exists only to collect the
//! I/O/subprocess/serialization failures the core's own plumbing can hit and
//! convert them into `ShadowboxError::PersistenceError` or
//! `ShadowboxError::ScraperError` at the repository/scraper boundary.

use shadowbox_types::ShadowboxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Child process error: {0}")]
    Process(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<CoreError> for ShadowboxError {
    fn from(err: CoreError) -> Self {
        ShadowboxError::persistence(err.to_string())
    }
}
