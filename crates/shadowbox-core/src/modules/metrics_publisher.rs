//! Shared Metrics Publisher: hourly connection reports and daily feature
//! reports POSTed to an external collector, gated on `serverConfig.metricsEnabled`.
//!
//! Redirects are followed manually rather than through reqwest's default
//! policy, which downgrades a POST to GET on 301/302/303 — the collector
//! contract requires every redirect to preserve method and body.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use shadowbox_types::{
    is_sanctioned, DailyFeatureReport, DataLimitFeature, HourlyConnectionReport, UserReport,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::modules::access_key::AccessKeyRepository;
use crate::modules::server_config::ServerConfigStore;
use crate::modules::usage_reader::UsageReader;

const HOURLY_INTERVAL: Duration = Duration::from_secs(3600);
const DAILY_INTERVAL: Duration = Duration::from_secs(24 * 3600);
const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct MetricsPublisherSettings {
    pub collector_url: String,
}

pub struct MetricsPublisher {
    settings: MetricsPublisherSettings,
    http: Client,
    server_config: Arc<ServerConfigStore>,
    access_keys: Arc<AccessKeyRepository>,
    usage_reader: Arc<UsageReader>,
    report_start_ms: Mutex<i64>,
}

impl MetricsPublisher {
    pub fn new(
        settings: MetricsPublisherSettings,
        server_config: Arc<ServerConfigStore>,
        access_keys: Arc<AccessKeyRepository>,
        usage_reader: Arc<UsageReader>,
    ) -> CoreResult<Arc<Self>> {
        let http = Client::builder().redirect(reqwest::redirect::Policy::none()).build()?;
        Ok(Arc::new(Self {
            settings,
            http,
            server_config,
            access_keys,
            usage_reader,
            report_start_ms: Mutex::new(Utc::now().timestamp_millis()),
        }))
    }

    /// Install the hourly and daily tick tasks. Returns immediately; both
    /// tasks run for the lifetime of the process.
    pub fn start(self: &Arc<Self>) {
        let hourly = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HOURLY_INTERVAL);
            loop {
                ticker.tick().await;
                hourly.hourly_tick().await;
            }
        });

        let daily = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DAILY_INTERVAL);
            loop {
                ticker.tick().await;
                daily.daily_tick().await;
            }
        });
    }

    async fn hourly_tick(&self) {
        let server = self.server_config.snapshot().await;
        if !server.metrics_enabled {
            return;
        }

        let now_ms = Utc::now().timestamp_millis();
        let start_ms = *self.report_start_ms.lock().await;
        let window_secs = ((now_ms - start_ms) / 1000).max(0);

        let usage = match self.usage_reader.key_country_usage(window_secs).await {
            Ok(usage) => usage,
            Err(err) => {
                warn!(%err, "failed to read usage for hourly report, leaving window open");
                return;
            },
        };

        let metrics_ids = self.metrics_id_by_access_key().await;
        let user_reports = build_user_reports(usage, &metrics_ids);

        if user_reports.is_empty() {
            info!("hourly report has no user entries after filtering, skipping send");
            *self.report_start_ms.lock().await = now_ms;
            return;
        }

        let report = HourlyConnectionReport {
            server_id: server.server_id.clone(),
            start_utc_ms: start_ms,
            end_utc_ms: now_ms,
            user_reports,
        };

        let url = format!("{}/connections", self.settings.collector_url);
        match post_preserving_redirects(&self.http, url, &report).await {
            Ok(()) => *self.report_start_ms.lock().await = now_ms,
            Err(err) => warn!(%err, "failed to POST hourly connection report, will retry"),
        }
    }

    async fn daily_tick(&self) {
        let server = self.server_config.snapshot().await;
        if !server.metrics_enabled {
            return;
        }

        let keys = self.access_keys.list_access_keys().await;
        let per_key_limit_count = keys.iter().filter(|k| k.data_limit.is_some()).count() as u64;

        let report = DailyFeatureReport {
            server_id: server.server_id.clone(),
            server_version: server.version.clone(),
            timestamp_utc_ms: Utc::now().timestamp_millis(),
            data_limit: DataLimitFeature {
                enabled: server.access_key_data_limit.is_some(),
                per_key_limit_count: Some(per_key_limit_count),
            },
        };

        let url = format!("{}/features", self.settings.collector_url);
        if let Err(err) = post_preserving_redirects(&self.http, url, &report).await {
            warn!(%err, "failed to POST daily feature report");
        }
    }

    async fn metrics_id_by_access_key(&self) -> std::collections::HashMap<String, String> {
        self.access_keys
            .list_access_keys()
            .await
            .into_iter()
            .map(|k| (k.id, k.metrics_id))
            .collect()
    }
}

/// POST `body` as JSON to `url`, manually following any 3xx redirect (same
/// method, same body) up to `MAX_REDIRECTS` times.
async fn post_preserving_redirects(
    http: &Client,
    mut url: String,
    body: &impl Serialize,
) -> CoreResult<()> {
    let payload = serde_json::to_vec(body)?;

    for _ in 0..MAX_REDIRECTS {
        let response = http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.clone())
            .send()
            .await?;

        if response.status().is_redirection() {
            let Some(location) = response.headers().get(reqwest::header::LOCATION) else {
                return Err(CoreError::Process("redirect with no Location header".to_string()));
            };
            url = location
                .to_str()
                .map_err(|e| CoreError::Process(format!("invalid Location header: {e}")))?
                .to_string();
            continue;
        }

        if response.status().is_success() {
            return Ok(());
        }

        return Err(CoreError::Process(format!("collector responded {}", response.status())));
    }

    Err(CoreError::Process("too many redirects POSTing to collector".to_string()))
}

/// Drop zero-byte and sanctioned-only entries, map each remaining one onto
/// its anonymized `metricsId`, and drop entries for keys this repository no
/// longer knows about (e.g. removed mid-window).
fn build_user_reports(
    usage: Vec<crate::modules::usage_reader::KeyCountryUsage>,
    metrics_ids: &std::collections::HashMap<String, String>,
) -> Vec<UserReport> {
    usage
        .into_iter()
        .filter(|u| u.bytes > 0)
        .filter(|u| u.country.as_deref().map(|c| !is_sanctioned(c)).unwrap_or(true))
        .filter_map(|u| {
            let user_id = metrics_ids.get(&u.access_key).cloned()?;
            Some(UserReport {
                user_id: Some(user_id),
                countries: u.country.into_iter().collect(),
                bytes_transferred: u.bytes,
                tunnel_time_ms: u.tunnel_time_ms,
                asn: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::modules::usage_reader::KeyCountryUsage;

    use super::*;

    fn ids() -> HashMap<String, String> {
        [("AA".to_string(), "mid-aa".to_string()), ("CC".to_string(), "mid-cc".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn drops_sanctioned_only_entries() {
        let usage = vec![
            KeyCountryUsage {
                access_key: "AA".into(),
                country: Some("US".into()),
                bytes: 11,
                tunnel_time_ms: None,
            },
            KeyCountryUsage {
                access_key: "SY".into(),
                country: Some("SY".into()),
                bytes: 11,
                tunnel_time_ms: None,
            },
        ];
        let reports = build_user_reports(usage, &ids());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].user_id.as_deref(), Some("mid-aa"));
    }

    #[test]
    fn drops_zero_byte_entries() {
        let usage = vec![KeyCountryUsage {
            access_key: "AA".into(),
            country: None,
            bytes: 0,
            tunnel_time_ms: None,
        }];
        assert!(build_user_reports(usage, &ids()).is_empty());
    }

    #[test]
    fn drops_entries_for_unknown_keys() {
        let usage = vec![KeyCountryUsage {
            access_key: "ZZ".into(),
            country: None,
            bytes: 42,
            tunnel_time_ms: None,
        }];
        assert!(build_user_reports(usage, &ids()).is_empty());
    }
}
