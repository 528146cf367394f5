//! Read-only usage queries against the scraper, backed by `ScraperClient`.

use std::collections::HashMap;

use chrono::Utc;
use shadowbox_types::{
    ConnectionStats, Location, LocationUsage, PeakDevices, PerKeyMetrics, PerLocationMetrics,
    ServerMetrics, ShadowboxError,
};

use crate::modules::scraper_client::ScraperClient;

const STEP_SECS: i64 = 300;

pub struct UsageReader {
    client: ScraperClient,
}

/// One access key's usage broken down to a single country, for the window a
/// caller queried over.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCountryUsage {
    pub access_key: String,
    pub country: Option<String>,
    pub bytes: u64,
    pub tunnel_time_ms: Option<u64>,
}

impl UsageReader {
    pub fn new(client: ScraperClient) -> Self {
        Self { client }
    }

    /// Total bytes transferred per access key over the last `hours`,
    /// excluding keys with zero usage.
    pub async fn outbound_bytes_by_access_key(
        &self,
        hours: i64,
    ) -> Result<HashMap<String, u64>, ShadowboxError> {
        let promql = format!(
            r#"sum(increase(shadowsocks_data_bytes{{dir=~"c<p|p>t"}}[{hours}h])) by (access_key)"#
        );
        let data = self.client.query(&promql).await?;
        let mut usage = HashMap::new();
        for sample in vector_samples(&data) {
            let Some(key) = sample.metric.get("access_key").and_then(|v| v.as_str()) else {
                continue;
            };
            if sample.value > 0.0 {
                usage.insert(key.to_string(), sample.value as u64);
            }
        }
        Ok(usage)
    }

    /// Per-key, per-country usage over the trailing `window_secs` — used by
    /// the metrics publisher to build anonymized per-user rows without a
    /// 5-minute-step range query (the publisher's window is arbitrary, set
    /// by the last successful report, not step-aligned).
    pub async fn key_country_usage(
        &self,
        window_secs: i64,
    ) -> Result<Vec<KeyCountryUsage>, ShadowboxError> {
        let bytes_promql = format!(
            r#"sum(increase(shadowsocks_data_bytes{{dir=~"c<p|p>t"}}[{window_secs}s])) by (access_key, country)"#
        );
        let tunnel_promql = format!(
            r#"sum(increase(shadowsocks_tunnel_time_seconds[{window_secs}s])) by (access_key, country)"#
        );

        let bytes_data = self.client.query(&bytes_promql).await?;
        let tunnel_data = self.client.query(&tunnel_promql).await?;

        let mut tunnel_secs: HashMap<(String, Option<String>), f64> = HashMap::new();
        for sample in vector_samples(&tunnel_data) {
            let Some(key) = sample.metric.get("access_key").and_then(|v| v.as_str()) else {
                continue;
            };
            let country =
                sample.metric.get("country").and_then(|v| v.as_str()).map(String::from);
            tunnel_secs.insert((key.to_string(), country), sample.value);
        }

        let mut out = Vec::new();
        for sample in vector_samples(&bytes_data) {
            let Some(key) = sample.metric.get("access_key").and_then(|v| v.as_str()) else {
                continue;
            };
            if sample.value <= 0.0 {
                continue;
            }
            let country =
                sample.metric.get("country").and_then(|v| v.as_str()).map(String::from);
            let tunnel_time_ms = tunnel_secs
                .get(&(key.to_string(), country.clone()))
                .map(|secs| (*secs * 1000.0) as u64);
            out.push(KeyCountryUsage {
                access_key: key.to_string(),
                country,
                bytes: sample.value as u64,
                tunnel_time_ms,
            });
        }
        Ok(out)
    }

    /// Per-location and per-key metrics over the trailing `duration_secs`.
    pub async fn server_metrics(
        &self,
        duration_secs: i64,
    ) -> Result<ServerMetrics, ShadowboxError> {
        let now = Utc::now().timestamp();
        let end = round_up_to_step(now);
        let start = end - duration_secs;

        let bytes_by_key = self
            .range_matrix(
                r#"sum(increase(shadowsocks_data_bytes{dir=~"c<p|p>t"}[5m])) by (access_key)"#,
                start,
                end,
            )
            .await?;
        let tunnel_time_by_key = self
            .range_matrix(
                r#"sum(increase(shadowsocks_tunnel_time_seconds[5m])) by (access_key)"#,
                start,
                end,
            )
            .await?;
        let by_location = self
            .range_matrix_by_location(
                r#"sum(increase(shadowsocks_data_bytes{dir=~"c<p|p>t"}[5m])) by (country, asn, as_org)"#,
                start,
                end,
            )
            .await?;
        let location_tunnel_time = self
            .range_matrix_by_location(
                r#"sum(increase(shadowsocks_tunnel_time_seconds[5m])) by (country, asn, as_org)"#,
                start,
                end,
            )
            .await?;

        let per_key = bytes_by_key
            .into_iter()
            .map(|(id, series)| {
                let total_bytes: u64 = series.iter().map(|(_, v)| *v as u64).sum();
                let tunnel_time_series = tunnel_time_by_key.get(&id).map(Vec::as_slice).unwrap_or(&[]);
                let tunnel_time_sec: u64 = tunnel_time_series.iter().map(|(_, v)| *v as u64).sum();
                PerKeyMetrics {
                    connection: connection_stats(&series, tunnel_time_series, now),
                    id,
                    bytes: total_bytes,
                    tunnel_time_sec,
                }
            })
            .collect();

        let per_location = by_location
            .into_iter()
            .map(|(location, series)| {
                let bytes: u64 = series.iter().map(|(_, v)| *v as u64).sum();
                let tunnel_time_sec: u64 = location_tunnel_time
                    .get(&location)
                    .map(|s| s.iter().map(|(_, v)| *v as u64).sum())
                    .unwrap_or(0);
                PerLocationMetrics {
                    location: location.country,
                    asn: location.asn,
                    as_org: location.as_org,
                    bytes,
                    tunnel_time_sec,
                }
            })
            .collect();

        Ok(ServerMetrics { per_location, per_key })
    }

    async fn range_matrix(
        &self,
        promql: &str,
        start: i64,
        end: i64,
    ) -> Result<HashMap<String, Vec<(i64, f64)>>, ShadowboxError> {
        let data = self.client.query_range(promql, start, end, STEP_SECS as u64).await?;
        let mut out = HashMap::new();
        for series in matrix_series(&data) {
            let Some(key) = series.metric.get("access_key").and_then(|v| v.as_str()) else {
                continue;
            };
            out.insert(key.to_string(), series.values);
        }
        Ok(out)
    }

    async fn range_matrix_by_location(
        &self,
        promql: &str,
        start: i64,
        end: i64,
    ) -> Result<HashMap<Location, Vec<(i64, f64)>>, ShadowboxError> {
        let data = self.client.query_range(promql, start, end, STEP_SECS as u64).await?;
        let mut out = HashMap::new();
        for series in matrix_series(&data) {
            let location = Location {
                country: series.metric.get("country").and_then(|v| v.as_str()).map(String::from),
                asn: series
                    .metric
                    .get("asn")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok()),
                as_org: series.metric.get("as_org").and_then(|v| v.as_str()).map(String::from),
            };
            out.insert(location, series.values);
        }
        Ok(out)
    }
}

fn round_up_to_step(unix_secs: i64) -> i64 {
    let remainder = unix_secs % STEP_SECS;
    if remainder == 0 {
        unix_secs
    } else {
        unix_secs + (STEP_SECS - remainder)
    }
}

/// `peakDevices.count` is the largest concurrent-device count implied by
/// tunnel-time accumulation over any 5-minute step: `ceil(tunnel_time_in_step
/// / step_secs)`. `lastConnected`/`lastTrafficSeen` are the most recent step
/// timestamp with a positive value, clamped to `now`.
fn connection_stats(
    bytes_series: &[(i64, f64)],
    tunnel_time_series: &[(i64, f64)],
    now: i64,
) -> ConnectionStats {
    let last_positive = bytes_series.iter().rev().find(|(_, v)| *v > 0.0).map(|(ts, _)| *ts);
    let clamp = |ts: i64| ts.min(now);

    let peak_devices = tunnel_time_series
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(ts, v)| PeakDevices {
            count: (v / STEP_SECS as f64).ceil() as u64,
            timestamp: clamp(*ts),
        });

    ConnectionStats {
        last_connected: last_positive.map(clamp),
        last_traffic_seen: last_positive.map(clamp),
        peak_devices,
    }
}

struct VectorSample {
    metric: serde_json::Map<String, serde_json::Value>,
    value: f64,
}

struct MatrixSeries {
    metric: serde_json::Map<String, serde_json::Value>,
    values: Vec<(i64, f64)>,
}

fn vector_samples(data: &serde_json::Value) -> Vec<VectorSample> {
    data.get("result")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|entry| {
                    let metric = entry.get("metric")?.as_object()?.clone();
                    let pair = entry.get("value")?.as_array()?;
                    let value: f64 = pair.get(1)?.as_str()?.parse().ok()?;
                    Some(VectorSample { metric, value })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn matrix_series(data: &serde_json::Value) -> Vec<MatrixSeries> {
    data.get("result")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|entry| {
                    let metric = entry.get("metric")?.as_object()?.clone();
                    let values = entry
                        .get("values")?
                        .as_array()?
                        .iter()
                        .filter_map(|pair| {
                            let pair = pair.as_array()?;
                            let ts = pair.first()?.as_f64()? as i64;
                            let val: f64 = pair.get(1)?.as_str()?.parse().ok()?;
                            Some((ts, val))
                        })
                        .collect();
                    Some(MatrixSeries { metric, values })
                })
                .collect()
        })
        .unwrap_or_default()
}
