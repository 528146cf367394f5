//! Data-limit enforcement: re-derives `isOver(k)` for every key and pushes
//! the filtered key set to the proxy.
//!
//! Runs on the 60s tick installed by `AccessKeyRepository::start` and
//! synchronously from every limit-touching mutation, so an admin raising or
//! lowering a limit observes the effect before their request returns.

use std::collections::HashMap;

use shadowbox_types::{AccessKey, ShadowboxError, ShadowboxResult};
use tracing::warn;

use super::AccessKeyRepository;

/// Usage is summed over a trailing 30-day window by default; this is not
/// currently exposed through the REST surface.
const DEFAULT_DATA_USAGE_HOURS: i64 = 24 * 30;

pub async fn enforce(repo: &AccessKeyRepository) -> ShadowboxResult<()> {
    let server = repo.server_config.snapshot().await;
    let keys = repo.list_access_keys().await;

    // A scraper failure is "no usage data" to this caller, not a reason to
    // fail the admin's request — every key reads as used = 0 for this tick.
    let used = match repo.usage_reader.outbound_bytes_by_access_key(DEFAULT_DATA_USAGE_HOURS).await
    {
        Ok(usage) => usage,
        Err(ShadowboxError::ScraperError { kind, message }) => {
            warn!(kind, message, "scraper unavailable, treating usage as zero for this tick");
            HashMap::new()
        },
        Err(other) => return Err(other),
    };

    let enabled: Vec<AccessKey> = keys
        .into_iter()
        .filter(|key| {
            let limit_bytes = key
                .data_limit
                .map(|l| l.bytes)
                .or_else(|| server.access_key_data_limit.map(|l| l.bytes));
            let Some(limit_bytes) = limit_bytes else {
                repo.over_limit.remove(&key.id);
                return true;
            };
            let used_bytes = used.get(&key.id).copied().unwrap_or(0);
            let is_over = used_bytes > limit_bytes;
            if is_over {
                repo.over_limit.insert(key.id.clone());
            } else {
                repo.over_limit.remove(&key.id);
            }
            !is_over
        })
        .collect();

    repo.proxy_supervisor.update(&enabled).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shadowbox_types::DataLimit;

    use super::*;
    use crate::modules::port_provider::PortProvider;
    use crate::modules::proxy_supervisor::{ProxySupervisor, ProxySupervisorSettings};
    use crate::modules::scraper_client::{ScraperClient, ScraperClientConfig};
    use crate::modules::server_config::ServerConfigStore;
    use crate::modules::usage_reader::UsageReader;

    async fn repo_fixture(dir: &std::path::Path) -> Arc<AccessKeyRepository> {
        let port_provider = Arc::new(PortProvider::new());
        let server_config = Arc::new(
            ServerConfigStore::load(
                dir.join("server_config.json"),
                "shadowbox".to_string(),
                "1.0.0".to_string(),
                port_provider.clone(),
            )
            .await
            .unwrap(),
        );
        let proxy_supervisor = Arc::new(ProxySupervisor::new(ProxySupervisorSettings {
            binary_path: "/bin/true".into(),
            config_path: dir.join("proxy_config.yml"),
            mmdb_path: None,
            replay_protection: false,
        }));
        let scraper_client =
            ScraperClient::new(ScraperClientConfig::new("http://127.0.0.1:1")).unwrap();
        let usage_reader = Arc::new(UsageReader::new(scraper_client));

        AccessKeyRepository::load(
            dir.join("shadowbox_config.json"),
            server_config,
            port_provider,
            proxy_supervisor,
            usage_reader,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn key_with_no_reported_usage_stays_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_fixture(dir.path()).await;
        let key = repo.create_new_access_key().await.unwrap();
        repo.set_access_key_data_limit(&key.id, DataLimit { bytes: 100 }).await.unwrap();

        assert!(!repo.is_over_data_limit(&key.id));
    }
}
