//! Transient usage data read back from the scraper.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-key byte counters since the last limit-enforcement reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyUsage {
    pub bytes_by_access_key: HashMap<String, u64>,
}

/// Where a sample of traffic geographically originated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub country: Option<String>,
    pub asn: Option<u32>,
    pub as_org: Option<String>,
}

#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct LocationUsage {
    pub bytes: u64,
    pub tunnel_time_sec: u64,
}

/// The largest concurrent-device count implied by tunnel-time accumulation
/// over any 5-minute step in the query window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeakDevices {
    pub count: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStats {
    pub last_connected: Option<i64>,
    pub last_traffic_seen: Option<i64>,
    pub peak_devices: Option<PeakDevices>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerKeyMetrics {
    pub id: String,
    pub bytes: u64,
    pub tunnel_time_sec: u64,
    pub connection: ConnectionStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerLocationMetrics {
    pub location: Option<String>,
    pub asn: Option<u32>,
    pub as_org: Option<String>,
    pub bytes: u64,
    pub tunnel_time_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerMetrics {
    pub per_location: Vec<PerLocationMetrics>,
    pub per_key: Vec<PerKeyMetrics>,
}
