//! # Shadowbox Core
//!
//! Core control-plane logic for Shadowbox: the access-key repository, the
//! process supervisors for the proxy and usage scraper, the metrics
//! pipeline, and the small stateful helpers (port provider, rollout
//! tracker, atomic JSON config store) they're all built on. No HTTP
//! framework dependency lives here; `shadowbox-server` and
//! `shadowbox-collector` wire these modules into axum routers and
//! schedulers.

pub mod error;
pub mod modules;

pub use error::{CoreError, CoreResult};
