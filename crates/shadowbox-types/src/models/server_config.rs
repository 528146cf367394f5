//! The server-wide settings singleton, persisted to
//! `shadowbox_server_config.json`.

use serde::{Deserialize, Serialize};

use super::access_key::DataLimit;

/// A single rollout flag's pinned/unpinned state, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolloutEntry {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub server_id: String,
    pub name: String,
    pub created_timestamp_ms: i64,
    pub hostname: String,
    pub port_for_new_access_keys: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_data_limit: Option<DataLimit>,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub rollouts: Vec<RolloutEntry>,
    pub version: String,
}

impl ServerConfig {
    /// Placeholder used before `serverId`/`createdTimestampMs`/`portForNewAccessKeys`
    /// have been assigned on first boot. Never persisted in this shape.
    pub fn uninitialized(default_name: String, version: String) -> Self {
        Self {
            server_id: String::new(),
            name: default_name,
            created_timestamp_ms: 0,
            hostname: String::new(),
            port_for_new_access_keys: 0,
            access_key_data_limit: None,
            metrics_enabled: false,
            rollouts: Vec::new(),
            version,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.server_id.is_empty()
    }
}
