use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::sink::{ColumnarSink, PostgresSink};

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub sink: Arc<dyn ColumnarSink>,
}

impl AppState {
    pub async fn new(cli: &Cli) -> Result<Self> {
        let sink = PostgresSink::connect(&cli.database_url)
            .await
            .context("connecting to the warehouse database")?;
        Ok(Self { inner: Arc::new(AppStateInner { sink: Arc::new(sink) }) })
    }

    /// Test-only constructor taking an injected sink — used by handler
    /// unit tests and the crate's `tests/` integration suite.
    pub fn with_sink(sink: Arc<dyn ColumnarSink>) -> Self {
        Self { inner: Arc::new(AppStateInner { sink }) }
    }
}
