//! Supervises the Shadowsocks proxy child process.
//!
//! `update(keys)` writes the proxy's YAML config (keys sorted by id),
//! atomically, then either spawns the child (first run) or sends it
//! `SIGHUP` to re-read the file. The supervisor does not inspect the
//! child's stdout for correctness — readiness is assumed once spawn
//! succeeds and the config has been written. Exit is never fatal: a
//! background task waits on the child and respawns it with capped
//! exponential backoff.

use std::path::PathBuf;
use std::sync::Arc;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use shadowbox_types::AccessKey;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::modules::backoff::RestartBackoff;
use crate::modules::config_store::atomic_write;

#[derive(Debug, Clone)]
pub struct ProxySupervisorSettings {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    /// Optional MMDB path enabling country-tagging in the proxy's metrics.
    pub mmdb_path: Option<PathBuf>,
    pub replay_protection: bool,
}

#[derive(Serialize)]
struct ProxyKeyConfig {
    id: String,
    port: u16,
    cipher: String,
    secret: String,
}

#[derive(Serialize)]
struct ProxyConfigFile {
    keys: Vec<ProxyKeyConfig>,
}

pub struct ProxySupervisor {
    settings: ProxySupervisorSettings,
    state: Arc<Mutex<SupervisorState>>,
}

struct SupervisorState {
    child: Option<Child>,
    backoff: RestartBackoff,
}

impl ProxySupervisor {
    pub fn new(settings: ProxySupervisorSettings) -> Self {
        Self {
            settings,
            state: Arc::new(Mutex::new(SupervisorState { child: None, backoff: RestartBackoff::new() })),
        }
    }

    /// Re-materialize the proxy config from `keys` and either spawn the
    /// child (first call) or SIGHUP it to reload.
    pub async fn update(&self, keys: &[AccessKey]) -> CoreResult<()> {
        self.write_config(keys)?;

        let mut state = self.state.lock().await;
        match &mut state.child {
            Some(child) => self.reload(child)?,
            None => {
                let child = self.spawn_child()?;
                state.backoff.record_spawn();
                state.child = Some(child);
                self.watch(self.state.clone());
            },
        }
        Ok(())
    }

    fn write_config(&self, keys: &[AccessKey]) -> CoreResult<()> {
        let mut sorted: Vec<&AccessKey> = keys.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let file = ProxyConfigFile {
            keys: sorted
                .into_iter()
                .map(|k| ProxyKeyConfig {
                    id: k.id.clone(),
                    port: k.port,
                    cipher: k.encryption_method.clone(),
                    secret: k.password.clone(),
                })
                .collect(),
        };

        let yaml = serde_yaml::to_string(&file)?;
        atomic_write(&self.settings.config_path, yaml.as_bytes())
    }

    fn spawn_child(&self) -> CoreResult<Child> {
        let mut cmd = Command::new(&self.settings.binary_path);
        cmd.arg("-c").arg(&self.settings.config_path);
        if let Some(mmdb) = &self.settings.mmdb_path {
            cmd.arg("--ip_country_db").arg(mmdb);
        }
        if self.settings.replay_protection {
            cmd.arg("--replay_history").arg("10000");
        }
        cmd.kill_on_drop(true);
        let child = cmd.spawn()?;
        info!(pid = ?child.id(), "proxy process spawned");
        Ok(child)
    }

    fn reload(&self, child: &Child) -> CoreResult<()> {
        let Some(pid) = child.id() else {
            return Err(CoreError::Process("proxy child has no pid".to_string()));
        };
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGHUP)
            .map_err(|e| CoreError::Process(format!("SIGHUP failed: {e}")))?;
        info!(pid, "proxy process sent SIGHUP to reload config");
        Ok(())
    }

    /// Wait on the child in the background; respawn unconditionally, with
    /// capped exponential backoff, whenever it exits or fails to spawn.
    /// Never gives up: a permanently-broken binary just keeps retrying at
    /// the 30s ceiling rather than leaving the proxy unsupervised.
    fn watch(&self, state: Arc<Mutex<SupervisorState>>) {
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let supervisor = ProxySupervisor { settings, state: state.clone() };
            loop {
                let mut guard = state.lock().await;
                let mut child = guard.child.take();
                drop(guard);

                if let Some(c) = &mut child {
                    let status = c.wait().await;
                    warn!(?status, "proxy process exited, scheduling respawn");
                }

                let mut guard = state.lock().await;
                let delay = guard.backoff.record_exit();
                drop(guard);

                tokio::time::sleep(delay).await;

                match supervisor.spawn_child() {
                    Ok(child) => {
                        let mut guard = state.lock().await;
                        guard.backoff.record_spawn();
                        guard.child = Some(child);
                    },
                    Err(err) => {
                        warn!(%err, "failed to respawn proxy process, will retry");
                    },
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, port: u16) -> AccessKey {
        AccessKey {
            id: id.to_string(),
            metrics_id: "11111111-1111-1111-1111-111111111111".to_string(),
            name: "k".to_string(),
            password: "password1234".to_string(),
            port,
            encryption_method: "chacha20-ietf-poly1305".to_string(),
            data_limit: None,
        }
    }

    #[test]
    fn write_config_sorts_keys_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = ProxySupervisor::new(ProxySupervisorSettings {
            binary_path: "/bin/true".into(),
            config_path: dir.path().join("config.yml"),
            mmdb_path: None,
            replay_protection: false,
        });

        let keys = vec![key("b", 2), key("a", 1)];
        supervisor.write_config(&keys).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("config.yml")).unwrap();
        let a_pos = contents.find("id: a").unwrap();
        let b_pos = contents.find("id: b").unwrap();
        assert!(a_pos < b_pos);
    }
}
