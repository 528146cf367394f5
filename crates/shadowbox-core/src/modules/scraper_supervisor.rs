//! Supervises the metrics scraper child process and owns its query client.
//!
//! `start` writes the scrape config as YAML, spawns the scraper binary, and
//! polls its readiness endpoint every second with no retry limit — the
//! scraper can take an arbitrary amount of time to come up and there is no
//! fallback path, so giving up would just turn a slow start into an outage.
//! Respawn-on-exit mirrors the proxy supervisor's capped backoff.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::CoreResult;
use crate::modules::backoff::RestartBackoff;
use crate::modules::config_store::atomic_write;
use crate::modules::scraper_client::ScraperClient;

#[derive(Debug, Clone)]
pub struct ScraperSupervisorSettings {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub args: Vec<String>,
}

pub struct ScraperSupervisor {
    settings: ScraperSupervisorSettings,
    client: ScraperClient,
    state: Arc<Mutex<SupervisorState>>,
}

struct SupervisorState {
    child: Option<Child>,
    backoff: RestartBackoff,
}

impl ScraperSupervisor {
    pub fn new(settings: ScraperSupervisorSettings, client: ScraperClient) -> Self {
        Self {
            settings,
            client,
            state: Arc::new(Mutex::new(SupervisorState { child: None, backoff: RestartBackoff::new() })),
        }
    }

    pub fn client(&self) -> &ScraperClient {
        &self.client
    }

    /// Write `config` to the scrape-config file, spawn the scraper, and
    /// block until its readiness endpoint answers 2xx.
    pub async fn start(&self, config: &Value) -> CoreResult<()> {
        // `serde_json::Value`'s object map is a `BTreeMap` (this crate does
        // not enable `preserve_order`), so this already serializes with
        // keys sorted lexicographically.
        let yaml = serde_yaml::to_string(config)?;
        atomic_write(&self.settings.config_path, yaml.as_bytes())?;

        let child = self.spawn_child()?;
        {
            let mut guard = self.state.lock().await;
            guard.backoff.record_spawn();
            guard.child = Some(child);
        }
        self.watch();

        self.client.wait_until_ready().await;
        info!("scraper is ready");
        Ok(())
    }

    fn spawn_child(&self) -> CoreResult<Child> {
        let mut cmd = Command::new(&self.settings.binary_path);
        cmd.arg("--config.file").arg(&self.settings.config_path);
        cmd.args(&self.settings.args);
        cmd.kill_on_drop(true);
        let child = cmd.spawn()?;
        info!(pid = ?child.id(), "scraper process spawned");
        Ok(child)
    }

    fn watch(&self) {
        let settings = self.settings.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let supervisor_settings = settings;
            loop {
                let mut guard = state.lock().await;
                let mut child = guard.child.take();
                drop(guard);

                if let Some(c) = &mut child {
                    let status = c.wait().await;
                    warn!(?status, "scraper process exited, scheduling respawn");
                }

                let mut guard = state.lock().await;
                let delay = guard.backoff.record_exit();
                drop(guard);

                tokio::time::sleep(delay).await;

                let mut cmd = Command::new(&supervisor_settings.binary_path);
                cmd.arg("--config.file").arg(&supervisor_settings.config_path);
                cmd.args(&supervisor_settings.args);
                cmd.kill_on_drop(true);
                match cmd.spawn() {
                    Ok(child) => {
                        let mut guard = state.lock().await;
                        guard.backoff.record_spawn();
                        guard.child = Some(child);
                    },
                    Err(err) => {
                        warn!(%err, "failed to respawn scraper process, will retry");
                    },
                }
            }
        });
    }
}
