//! Persistent server-wide settings: the `ServerConfig` singleton.
//!
//! Every mutation here writes through immediately (`mutate_and_flush`)
//! rather than waiting for the periodic delayed-flush tick, since an admin
//! mutating server settings must observe the change on their very next
//! read.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use shadowbox_types::{DataLimit, ServerConfig, ShadowboxError, ShadowboxResult};
use uuid::Uuid;

use crate::modules::config_store::{Config, Delayed};
use crate::modules::port_provider::PortProvider;

const FLUSH_PERIOD: Duration = Duration::from_secs(5);

fn hostname_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
            .expect("static hostname regex is valid")
    })
}

fn is_valid_hostname(candidate: &str) -> bool {
    if IpAddr::from_str(candidate).is_ok() {
        return true;
    }
    !candidate.is_empty() && candidate.len() <= 253 && hostname_pattern().is_match(candidate)
}

pub struct ServerConfigStore {
    doc: Delayed<ServerConfig>,
    port_provider: Arc<PortProvider>,
}

impl ServerConfigStore {
    /// Load the document from `path`, then ensure it carries a `serverId`,
    /// `createdTimestampMs`, and `portForNewAccessKeys`, generating and
    /// persisting them on first boot.
    pub async fn load(
        path: PathBuf,
        default_name: String,
        version: String,
        port_provider: Arc<PortProvider>,
    ) -> ShadowboxResult<Self> {
        let config = Config::<ServerConfig>::load(path);
        let doc = Delayed::new(config, FLUSH_PERIOD);
        let store = Self { doc, port_provider };
        store.ensure_initialized(default_name, version).await?;
        Ok(store)
    }

    async fn ensure_initialized(&self, default_name: String, version: String) -> ShadowboxResult<()> {
        let already_initialized = self.doc.read(ServerConfig::is_initialized).await;
        if already_initialized {
            return Ok(());
        }

        let port = self.port_provider.reserve_new()?;
        self.doc
            .mutate_and_flush(|cfg| {
                *cfg = ServerConfig {
                    server_id: Uuid::new_v4().to_string(),
                    name: default_name,
                    created_timestamp_ms: Utc::now().timestamp_millis(),
                    hostname: String::new(),
                    port_for_new_access_keys: port,
                    access_key_data_limit: None,
                    metrics_enabled: false,
                    rollouts: Vec::new(),
                    version,
                };
            })
            .await?;
        Ok(())
    }

    pub async fn snapshot(&self) -> ServerConfig {
        self.doc.read(Clone::clone).await
    }

    pub fn handle(&self) -> Delayed<ServerConfig> {
        self.doc.clone()
    }

    pub async fn set_name(&self, name: String) -> ShadowboxResult<()> {
        if name.len() > 100 {
            return Err(ShadowboxError::InvalidName { name });
        }
        self.doc.mutate_and_flush(|cfg| cfg.name = name).await?;
        Ok(())
    }

    pub async fn set_hostname(&self, hostname: String) -> ShadowboxResult<()> {
        if !is_valid_hostname(&hostname) {
            return Err(ShadowboxError::InvalidHostname { hostname });
        }
        self.doc.mutate_and_flush(|cfg| cfg.hostname = hostname).await?;
        Ok(())
    }

    pub async fn set_port_for_new_access_keys(&self, port: i64) -> ShadowboxResult<()> {
        if !(1..=65535).contains(&port) {
            return Err(ShadowboxError::InvalidPortNumber { port });
        }
        let port = port as u16;
        self.port_provider.reserve(port)?;
        self.doc.mutate_and_flush(|cfg| cfg.port_for_new_access_keys = port).await?;
        Ok(())
    }

    pub async fn set_access_key_data_limit(&self, limit: DataLimit) -> ShadowboxResult<()> {
        self.doc.mutate_and_flush(|cfg| cfg.access_key_data_limit = Some(limit)).await?;
        Ok(())
    }

    pub async fn remove_access_key_data_limit(&self) -> ShadowboxResult<()> {
        self.doc.mutate_and_flush(|cfg| cfg.access_key_data_limit = None).await?;
        Ok(())
    }

    pub async fn set_metrics_enabled(&self, enabled: bool) -> ShadowboxResult<()> {
        self.doc.mutate_and_flush(|cfg| cfg.metrics_enabled = enabled).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hostnames_and_ip_literals() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("10.0.0.1"));
        assert!(is_valid_hostname("::1"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("not a hostname"));
    }

    #[tokio::test]
    async fn load_initializes_server_id_and_port_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadowbox_server_config.json");
        let port_provider = Arc::new(PortProvider::new());

        let store = ServerConfigStore::load(
            path.clone(),
            "shadowbox".to_string(),
            "1.0.0".to_string(),
            port_provider.clone(),
        )
        .await
        .unwrap();

        let snapshot = store.snapshot().await;
        assert!(!snapshot.server_id.is_empty());
        assert!(snapshot.port_for_new_access_keys >= 1024);

        // Reloading the same path must not generate a new serverId.
        let reloaded = ServerConfigStore::load(
            path,
            "shadowbox".to_string(),
            "1.0.0".to_string(),
            port_provider,
        )
        .await
        .unwrap();
        assert_eq!(reloaded.snapshot().await.server_id, snapshot.server_id);
    }

    #[tokio::test]
    async fn set_port_for_new_access_keys_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = ServerConfigStore::load(
            dir.path().join("cfg.json"),
            "shadowbox".to_string(),
            "1.0.0".to_string(),
            Arc::new(PortProvider::new()),
        )
        .await
        .unwrap();

        let err = store.set_port_for_new_access_keys(0).await.unwrap_err();
        assert_eq!(err, ShadowboxError::InvalidPortNumber { port: 0 });
    }
}
