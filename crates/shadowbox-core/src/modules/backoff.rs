//! Capped exponential backoff for child-process respawn.
//!
//! Shared by the proxy and scraper supervisors: unconditional immediate
//! respawn on every crash can spin a broken child in a tight loop, so both
//! supervisors back off 1s, 2s, 4s, ... up to a 30s ceiling, resetting once
//! the child has stayed up continuously for 60s.

use std::time::{Duration, Instant};

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);
const RESET_AFTER_UPTIME: Duration = Duration::from_secs(60);

pub struct RestartBackoff {
    next_delay: Duration,
    last_spawn: Option<Instant>,
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self { next_delay: INITIAL_DELAY, last_spawn: None }
    }
}

impl RestartBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call right after a successful spawn.
    pub fn record_spawn(&mut self) {
        self.last_spawn = Some(Instant::now());
    }

    /// Call when the child has exited. Returns how long to wait before
    /// respawning, resetting the backoff if the child had a healthy uptime.
    pub fn record_exit(&mut self) -> Duration {
        let stayed_up = self.last_spawn.map(|t| t.elapsed() >= RESET_AFTER_UPTIME).unwrap_or(false);
        if stayed_up {
            self.next_delay = INITIAL_DELAY;
        }
        let delay = self.next_delay;
        self.next_delay = (self.next_delay * 2).min(MAX_DELAY);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backs_off_exponentially_up_to_cap() {
        let mut backoff = RestartBackoff::new();
        // No recorded spawn yet: every crash is treated as rapid.
        assert_eq!(backoff.record_exit(), Duration::from_secs(1));
        assert_eq!(backoff.record_exit(), Duration::from_secs(2));
        assert_eq!(backoff.record_exit(), Duration::from_secs(4));
        assert_eq!(backoff.record_exit(), Duration::from_secs(8));
        assert_eq!(backoff.record_exit(), Duration::from_secs(16));
        assert_eq!(backoff.record_exit(), Duration::from_secs(30));
        assert_eq!(backoff.record_exit(), Duration::from_secs(30));
    }

    #[test]
    fn resets_after_sustained_uptime() {
        let mut backoff = RestartBackoff::new();
        backoff.record_exit();
        backoff.record_exit();
        backoff.record_spawn();
        backoff.last_spawn = Some(Instant::now() - Duration::from_secs(61));
        assert_eq!(backoff.record_exit(), Duration::from_secs(1));
    }
}
