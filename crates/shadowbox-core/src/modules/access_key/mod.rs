//! Access-Key Repository — owns the authoritative key list, reserves ports,
//! derives the proxy config, and enforces data limits.
//!
//! Every mutation writes the full access-key document before returning
//! success (`mutate_and_flush`); `next_id` is advanced before the key is
//! written, so a crash between the write and the response still yields a
//! unique id on the next `create`.

mod enforcement;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use shadowbox_types::{AccessKey, AccessKeyDocument, DataLimit, ShadowboxError, ShadowboxResult};
use uuid::Uuid;

use crate::modules::config_store::{Config, Delayed};
use crate::modules::port_provider::PortProvider;
use crate::modules::proxy_supervisor::ProxySupervisor;
use crate::modules::server_config::ServerConfigStore;
use crate::modules::usage_reader::UsageReader;

const FLUSH_PERIOD: Duration = Duration::from_secs(5);
const PASSWORD_LEN: usize = 12;
const ENFORCEMENT_INTERVAL: Duration = Duration::from_secs(60);

pub struct AccessKeyRepository {
    doc: Delayed<AccessKeyDocument>,
    server_config: Arc<ServerConfigStore>,
    port_provider: Arc<PortProvider>,
    proxy_supervisor: Arc<ProxySupervisor>,
    usage_reader: Arc<UsageReader>,
    over_limit: dashmap::DashSet<String>,
}

impl AccessKeyRepository {
    pub async fn load(
        path: PathBuf,
        server_config: Arc<ServerConfigStore>,
        port_provider: Arc<PortProvider>,
        proxy_supervisor: Arc<ProxySupervisor>,
        usage_reader: Arc<UsageReader>,
    ) -> ShadowboxResult<Arc<Self>> {
        let config = Config::<AccessKeyDocument>::load(path);
        port_provider.seed(config.data().access_keys.iter().map(|k| k.port));
        let doc = Delayed::new(config, FLUSH_PERIOD);

        let repo = Arc::new(Self {
            doc,
            server_config,
            port_provider,
            proxy_supervisor,
            usage_reader,
            over_limit: dashmap::DashSet::new(),
        });
        repo.push_proxy_config().await?;
        Ok(repo)
    }

    /// Install the periodic enforcement tick. Returns immediately; the tick
    /// runs for the lifetime of the process.
    pub fn start(self: &Arc<Self>) {
        let repo = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ENFORCEMENT_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(err) = repo.enforce().await {
                    tracing::warn!(%err, "limit enforcement tick failed");
                }
            }
        });
    }

    pub async fn list_access_keys(&self) -> Vec<AccessKey> {
        self.doc.read(|doc| doc.access_keys.clone()).await
    }

    pub async fn hostname(&self) -> String {
        self.server_config.snapshot().await.hostname
    }

    pub async fn create_new_access_key(&self) -> ShadowboxResult<AccessKey> {
        let server = self.server_config.snapshot().await;
        let port = server.port_for_new_access_keys;
        let data_limit = server.access_key_data_limit;

        let key = AccessKey {
            id: String::new(),
            metrics_id: Uuid::new_v4().to_string(),
            name: String::new(),
            password: generate_password(),
            port,
            encryption_method: shadowbox_types::DEFAULT_ENCRYPTION_METHOD.to_string(),
            data_limit,
        };

        let created = self
            .doc
            .mutate_and_flush(|doc| {
                let id = doc.next_id.to_string();
                doc.next_id += 1;
                let mut key = key;
                key.id = id;
                doc.access_keys.push(key.clone());
                key
            })
            .await?;

        self.push_proxy_config().await?;
        Ok(created)
    }

    pub async fn remove_access_key(&self, id: &str) -> ShadowboxResult<()> {
        let removed = self
            .doc
            .mutate_and_flush(|doc| {
                let before = doc.access_keys.len();
                doc.access_keys.retain(|k| k.id != id);
                before != doc.access_keys.len()
            })
            .await?;
        if !removed {
            return Err(ShadowboxError::AccessKeyNotFound { id: id.to_string() });
        }
        self.over_limit.remove(id);
        self.push_proxy_config().await?;
        Ok(())
    }

    pub async fn rename_access_key(&self, id: &str, name: String) -> ShadowboxResult<()> {
        if name.len() > 100 {
            return Err(ShadowboxError::InvalidName { name });
        }
        let found = self
            .doc
            .mutate_and_flush(|doc| {
                let key = doc.access_keys.iter_mut().find(|k| k.id == id);
                if let Some(key) = key {
                    key.name = name;
                    true
                } else {
                    false
                }
            })
            .await?;
        if !found {
            return Err(ShadowboxError::AccessKeyNotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub async fn set_access_key_data_limit(&self, id: &str, limit: DataLimit) -> ShadowboxResult<()> {
        let found = self
            .doc
            .mutate_and_flush(|doc| {
                let key = doc.access_keys.iter_mut().find(|k| k.id == id);
                if let Some(key) = key {
                    key.data_limit = Some(limit);
                    true
                } else {
                    false
                }
            })
            .await?;
        if !found {
            return Err(ShadowboxError::AccessKeyNotFound { id: id.to_string() });
        }
        // A limit change must be reflected before this call returns.
        self.enforce().await?;
        Ok(())
    }

    pub async fn remove_access_key_data_limit(&self, id: &str) -> ShadowboxResult<()> {
        let found = self
            .doc
            .mutate_and_flush(|doc| {
                let key = doc.access_keys.iter_mut().find(|k| k.id == id);
                if let Some(key) = key {
                    key.data_limit = None;
                    true
                } else {
                    false
                }
            })
            .await?;
        if !found {
            return Err(ShadowboxError::AccessKeyNotFound { id: id.to_string() });
        }
        self.enforce().await?;
        Ok(())
    }

    /// Validates, then delegates to the Port Provider and Server Config the
    /// same way a fresh reservation would — ports already bound by an
    /// existing key are always accepted.
    pub async fn set_port_for_new_access_keys(&self, port: i64) -> ShadowboxResult<()> {
        self.server_config.set_port_for_new_access_keys(port).await
    }

    pub async fn set_hostname(&self, hostname: String) -> ShadowboxResult<()> {
        self.server_config.set_hostname(hostname).await
    }

    pub async fn set_default_data_limit(&self, limit: DataLimit) -> ShadowboxResult<()> {
        self.server_config.set_access_key_data_limit(limit).await?;
        self.enforce().await?;
        Ok(())
    }

    pub async fn remove_default_data_limit(&self) -> ShadowboxResult<()> {
        self.server_config.remove_access_key_data_limit().await?;
        self.enforce().await?;
        Ok(())
    }

    pub async fn get_metrics_id(&self, id: &str) -> Option<String> {
        self.doc
            .read(|doc| doc.access_keys.iter().find(|k| k.id == id).map(|k| k.metrics_id.clone()))
            .await
    }

    pub fn is_over_data_limit(&self, id: &str) -> bool {
        self.over_limit.contains(id)
    }

    async fn push_proxy_config(&self) -> ShadowboxResult<()> {
        let keys = self.list_access_keys().await;
        let enabled: Vec<AccessKey> =
            keys.into_iter().filter(|k| !self.over_limit.contains(&k.id)).collect();
        self.proxy_supervisor.update(&enabled).await?;
        Ok(())
    }

    /// Re-query usage, recompute `isOver(k)` for every key, and push the
    /// filtered key set to the proxy. Idempotent — safe to call on every
    /// tick and on every limit-touching mutation.
    async fn enforce(&self) -> ShadowboxResult<()> {
        enforcement::enforce(self).await
    }
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}
