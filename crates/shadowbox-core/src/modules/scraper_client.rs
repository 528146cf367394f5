//! HTTP client for the colocated metrics scraper's PromQL-compatible query
//! API. Used by the Usage Reader to pull per-key byte counters and
//! per-location/per-key usage.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use shadowbox_types::ShadowboxError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ScraperClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl ScraperClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), timeout: DEFAULT_TIMEOUT }
    }
}

#[derive(Deserialize)]
struct PromEnvelope {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct ScraperClient {
    http: Client,
    endpoint: String,
}

impl ScraperClient {
    pub fn new(config: ScraperClientConfig) -> Result<Self, ShadowboxError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShadowboxError::scraper("client_build", e.to_string()))?;
        Ok(Self { http, endpoint: config.endpoint })
    }

    /// Instant query: `GET {endpoint}/api/v1/query?query=...`.
    pub async fn query(&self, promql: &str) -> Result<Value, ShadowboxError> {
        let url = format!("{}/api/v1/query", self.endpoint);
        let response = self
            .http
            .get(url)
            .query(&[("query", promql)])
            .send()
            .await
            .map_err(|e| ShadowboxError::scraper("http", e.to_string()))?;
        Self::parse_envelope(response).await
    }

    /// Range query: `GET {endpoint}/api/v1/query_range?query=...&start=...&end=...&step=...`.
    pub async fn query_range(
        &self,
        promql: &str,
        start_unix_secs: i64,
        end_unix_secs: i64,
        step_secs: u64,
    ) -> Result<Value, ShadowboxError> {
        let url = format!("{}/api/v1/query_range", self.endpoint);
        let response = self
            .http
            .get(url)
            .query(&[
                ("query", promql.to_string()),
                ("start", start_unix_secs.to_string()),
                ("end", end_unix_secs.to_string()),
                ("step", format!("{step_secs}s")),
            ])
            .send()
            .await
            .map_err(|e| ShadowboxError::scraper("http", e.to_string()))?;
        Self::parse_envelope(response).await
    }

    /// Poll `{endpoint}/api/v1/status/flags` until it returns 2xx. Unbounded
    /// retry at a 1s interval, matching the scraper supervisor's readiness
    /// contract.
    pub async fn wait_until_ready(&self) {
        let url = format!("{}/api/v1/status/flags", self.endpoint);
        loop {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_secs(1)).await,
            }
        }
    }

    async fn parse_envelope(response: reqwest::Response) -> Result<Value, ShadowboxError> {
        let envelope: PromEnvelope = response
            .json()
            .await
            .map_err(|e| ShadowboxError::scraper("invalid_response", e.to_string()))?;

        if envelope.status != "success" {
            return Err(ShadowboxError::scraper(
                envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
                envelope.error.unwrap_or_else(|| "scraper query failed".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ShadowboxError::scraper("empty_response", "missing data field".to_string()))
    }
}
