mod access_key;
mod reports;
mod server_config;
mod usage;

pub use access_key::{AccessKey, AccessKeyDocument, DataLimit, DEFAULT_ENCRYPTION_METHOD};
pub use reports::{
    is_sanctioned, DailyFeatureReport, DataLimitFeature, HourlyConnectionReport, UserReport,
    SANCTIONED_COUNTRIES,
};
pub use server_config::{RolloutEntry, ServerConfig};
pub use usage::{
    ConnectionStats, KeyUsage, Location, LocationUsage, PeakDevices, PerKeyMetrics,
    PerLocationMetrics, ServerMetrics,
};
