//! Wire shapes for the Shared Metrics Publisher and the Metrics Collector
//! Service's ingestion contract. Shared by both binaries so
//! the publisher's serialization and the collector's deserialization can
//! never drift.

use serde::{Deserialize, Serialize};

/// A single redeemer's usage within a reporting window. At least one of
/// `user_id`/`countries` must be present — enforced by the collector's
/// validator, not by this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    pub bytes_transferred: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourlyConnectionReport {
    pub server_id: String,
    pub start_utc_ms: i64,
    pub end_utc_ms: i64,
    pub user_reports: Vec<UserReport>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataLimitFeature {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_key_limit_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyFeatureReport {
    pub server_id: String,
    pub server_version: String,
    pub timestamp_utc_ms: i64,
    pub data_limit: DataLimitFeature,
}

/// Country codes excluded from exported reports by trade compliance policy.
/// This is the single authoritative list: both the publisher's pre-filter
/// and the collector's validator
/// import this constant rather than encoding it twice.
pub const SANCTIONED_COUNTRIES: &[&str] = &["CU", "IR", "KP", "SY"];

pub fn is_sanctioned(country: &str) -> bool {
    SANCTIONED_COUNTRIES.iter().any(|c| c.eq_ignore_ascii_case(country))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanctioned_list_is_case_insensitive() {
        assert!(is_sanctioned("sy"));
        assert!(is_sanctioned("KP"));
        assert!(!is_sanctioned("US"));
    }
}
