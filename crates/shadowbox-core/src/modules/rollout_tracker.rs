//! Deterministic per-instance feature-flag gating.
//!
//! `is_enabled` hashes `server_id || rollout_id` with MD5 and compares the
//! first byte of the digest against a percentage threshold, so the same
//! server either always or never falls inside a given rollout percentage —
//! no randomness, no persisted per-flag state unless explicitly forced.

use md5::{Digest, Md5};
use shadowbox_types::{RolloutEntry, ServerConfig};

use crate::error::{CoreError, CoreResult};
use crate::modules::config_store::Child;

pub type RolloutEntries = Child<Vec<RolloutEntry>, ServerConfig>;

pub struct RolloutTracker {
    server_id: String,
    forced: RolloutEntries,
}

impl RolloutTracker {
    pub fn new(server_id: String, forced: RolloutEntries) -> Self {
        Self { server_id, forced }
    }

    /// `percent` must be an integer in `[0, 100]`.
    pub async fn is_enabled(&self, rollout_id: &str, percent: u8) -> CoreResult<bool> {
        if percent > 100 {
            return Err(CoreError::Process(format!(
                "rollout percentage {percent} out of range"
            )));
        }

        if let Some(forced) = self.forced_value(rollout_id).await {
            return Ok(forced);
        }

        Ok(hash_falls_within(&self.server_id, rollout_id, percent))
    }

    /// Pin `rollout_id` to a fixed result, overriding the hash computation.
    pub async fn force(&self, rollout_id: &str, enabled: bool) {
        self.forced
            .mutate(|entries| {
                if let Some(entry) = entries.iter_mut().find(|e| e.id == rollout_id) {
                    entry.enabled = enabled;
                } else {
                    entries.push(RolloutEntry { id: rollout_id.to_string(), enabled });
                }
            })
            .await;
    }

    async fn forced_value(&self, rollout_id: &str) -> Option<bool> {
        self.forced.read(|entries| entries.iter().find(|e| e.id == rollout_id).map(|e| e.enabled)).await
    }
}

fn hash_falls_within(server_id: &str, rollout_id: &str, percent: u8) -> bool {
    let mut hasher = Md5::new();
    hasher.update(server_id.as_bytes());
    hasher.update(rollout_id.as_bytes());
    let digest = hasher.finalize();
    let threshold = f64::from(percent) * 2.56;
    f64::from(digest[0]) < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_percent_never_enabled() {
        for id in ["a", "b", "c", "server-1", "server-2"] {
            assert!(!hash_falls_within(id, "feature-x", 0));
        }
    }

    #[test]
    fn hundred_percent_always_enabled() {
        for id in ["a", "b", "c", "server-1", "server-2"] {
            assert!(hash_falls_within(id, "feature-x", 100));
        }
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let a = hash_falls_within("server-123", "feature-x", 50);
        let b = hash_falls_within("server-123", "feature-x", 50);
        assert_eq!(a, b);
    }
}
