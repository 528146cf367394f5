//! # Shadowbox Types
//!
//! Wire and persistence models plus the domain error taxonomy shared by
//! every Shadowbox crate. This crate performs no I/O.
//!
//! - **`error`** — `ShadowboxError`, the domain error taxonomy.
//! - **`models`** — access keys, server config, usage samples, and the
//!   metrics-publisher/collector report shapes.
//!
//! `shadowbox-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!                  shadowbox-types (this crate)
//!                          │
//!                   shadowbox-core
//!                  /              \
//!      shadowbox-server    shadowbox-collector
//! ```

pub mod error;
pub mod models;

pub use error::{ShadowboxError, ShadowboxResult};
pub use models::{
    is_sanctioned, AccessKey, AccessKeyDocument, ConnectionStats, DailyFeatureReport, DataLimit,
    DataLimitFeature, HourlyConnectionReport, KeyUsage, Location, LocationUsage, PeakDevices,
    PerKeyMetrics, PerLocationMetrics, RolloutEntry, ServerConfig, ServerMetrics, UserReport,
    DEFAULT_ENCRYPTION_METHOD, SANCTIONED_COUNTRIES,
};
