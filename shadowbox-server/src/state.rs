//! Shared application state: the access-key repository and the server-config
//! store, both `Arc`-shared with the background tick tasks the repository
//! and publisher install on startup.

use std::sync::Arc;

use anyhow::{Context, Result};
use shadowbox_core::modules::access_key::AccessKeyRepository;
use shadowbox_core::modules::config_store::Child;
use shadowbox_core::modules::metrics_publisher::{MetricsPublisher, MetricsPublisherSettings};
use shadowbox_core::modules::port_provider::PortProvider;
use shadowbox_core::modules::proxy_supervisor::{ProxySupervisor, ProxySupervisorSettings};
use shadowbox_core::modules::rollout_tracker::RolloutTracker;
use shadowbox_core::modules::scraper_client::{ScraperClient, ScraperClientConfig};
use shadowbox_core::modules::scraper_supervisor::{ScraperSupervisor, ScraperSupervisorSettings};
use shadowbox_core::modules::server_config::ServerConfigStore;
use shadowbox_core::modules::usage_reader::UsageReader;
use shadowbox_types::ServerConfig;

use crate::cli::Cli;

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub access_keys: Arc<AccessKeyRepository>,
    pub server_config: Arc<ServerConfigStore>,
    pub usage_reader: Arc<UsageReader>,
    pub rollout_tracker: Arc<RolloutTracker>,
    pub api_prefix: String,
}

/// Rollout id gating the proxy's replay-protection feature: on at 100% by
/// default, but can be forced off via the persisted `rollouts` list without
/// touching `SB_REPLAY_PROTECTION`.
const REPLAY_PROTECTION_ROLLOUT: &str = "replay-protection";

/// Usage is summed over a trailing 30-day window for the transfer-metrics
/// endpoint, matching the enforcement loop's own window.
pub const METRICS_TRANSFER_HOURS: i64 = 24 * 30;

impl AppState {
    pub async fn new(cli: &Cli) -> Result<Self> {
        std::fs::create_dir_all(&cli.state_dir)
            .with_context(|| format!("creating state dir {}", cli.state_dir.display()))?;

        let port_provider = Arc::new(PortProvider::new());

        let server_config = Arc::new(
            ServerConfigStore::load(
                cli.state_dir.join("shadowbox_server_config.json"),
                cli.default_server_name.clone(),
                env!("CARGO_PKG_VERSION").to_string(),
                port_provider.clone(),
            )
            .await
            .context("loading server config")?,
        );

        let rollout_tracker = Arc::new(RolloutTracker::new(
            server_config.snapshot().await.server_id,
            Child::new(server_config.handle(), |cfg: &ServerConfig| &cfg.rollouts, |cfg: &mut ServerConfig| {
                &mut cfg.rollouts
            }),
        ));
        let replay_protection = cli.replay_protection
            && rollout_tracker
                .is_enabled(REPLAY_PROTECTION_ROLLOUT, 100)
                .await
                .context("evaluating replay-protection rollout")?;

        let proxy_supervisor = Arc::new(ProxySupervisor::new(ProxySupervisorSettings {
            binary_path: cli.proxy_binary.clone(),
            config_path: cli.state_dir.join("outline-ss-server/config.yml"),
            mmdb_path: cli.mmdb_path.clone(),
            replay_protection,
        }));

        let scraper_client =
            ScraperClient::new(ScraperClientConfig::new(cli.scraper_url.clone()))?;
        let usage_reader = Arc::new(UsageReader::new(scraper_client.clone()));

        let scraper_supervisor = ScraperSupervisor::new(
            ScraperSupervisorSettings {
                binary_path: cli.scraper_binary.clone(),
                config_path: cli.state_dir.join("prometheus/config.yml"),
                args: vec![
                    "--storage.tsdb.path".to_string(),
                    cli.state_dir.join("prometheus/data").display().to_string(),
                ],
            },
            scraper_client,
        );
        scraper_supervisor
            .start(&default_scrape_config())
            .await
            .context("starting metrics scraper")?;

        let access_keys = AccessKeyRepository::load(
            cli.state_dir.join("shadowbox_config.json"),
            server_config.clone(),
            port_provider,
            proxy_supervisor,
            usage_reader.clone(),
        )
        .await
        .context("loading access-key repository")?;
        access_keys.start();

        let publisher = MetricsPublisher::new(
            MetricsPublisherSettings { collector_url: cli.metrics_url.clone() },
            server_config.clone(),
            access_keys.clone(),
            usage_reader.clone(),
        )?;
        publisher.start();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                access_keys,
                server_config,
                usage_reader,
                rollout_tracker,
                api_prefix: cli.api_prefix.clone().unwrap_or_default(),
            }),
        })
    }

    /// Test-only constructor: wires the same components as `new`, but
    /// against `/bin/true` for the proxy binary and an unreachable scraper
    /// endpoint, so router/middleware tests don't need `outline-ss-server`
    /// or `prometheus` installed. Mirrors `enforcement.rs`'s own test
    /// fixture, which uses the identical unreachable-scraper pattern.
    ///
    /// Not `#[cfg(test)]`: the crate's `tests/` integration binary links
    /// this lib compiled without `cfg(test)`, so a test-only gate here
    /// would make the constructor invisible to it.
    pub async fn test_only(state_dir: std::path::PathBuf, api_prefix: String) -> Result<Self> {
        let port_provider = Arc::new(PortProvider::new());

        let server_config = Arc::new(
            ServerConfigStore::load(
                state_dir.join("shadowbox_server_config.json"),
                "shadowbox-test".to_string(),
                "0.0.0-test".to_string(),
                port_provider.clone(),
            )
            .await
            .context("loading server config")?,
        );

        let rollout_tracker = Arc::new(RolloutTracker::new(
            server_config.snapshot().await.server_id,
            Child::new(server_config.handle(), |cfg: &ServerConfig| &cfg.rollouts, |cfg: &mut ServerConfig| {
                &mut cfg.rollouts
            }),
        ));

        let proxy_supervisor = Arc::new(ProxySupervisor::new(ProxySupervisorSettings {
            binary_path: "/bin/true".into(),
            config_path: state_dir.join("outline-ss-server/config.yml"),
            mmdb_path: None,
            replay_protection: false,
        }));

        let scraper_client =
            ScraperClient::new(ScraperClientConfig::new("http://127.0.0.1:1"))?;
        let usage_reader = Arc::new(UsageReader::new(scraper_client));

        let access_keys = AccessKeyRepository::load(
            state_dir.join("shadowbox_config.json"),
            server_config.clone(),
            port_provider,
            proxy_supervisor,
            usage_reader.clone(),
        )
        .await
        .context("loading access-key repository")?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                access_keys,
                server_config,
                usage_reader,
                rollout_tracker,
                api_prefix,
            }),
        })
    }
}

fn default_scrape_config() -> serde_json::Value {
    serde_json::json!({
        "global": { "scrape_interval": "1m" },
        "scrape_configs": [{
            "job_name": "shadowbox-proxy",
            "static_configs": [{ "targets": ["127.0.0.1:9091"] }],
        }],
    })
}
