//! Port reservation and liveness probing.
//!
//! Freeness is determined by attempting to bind a listener on the OS socket
//! and releasing it immediately — never by shelling out to `lsof`. The
//! provider only tracks ports it has reserved itself; a port bound by one of
//! this process's own access keys is never re-probed, since access keys can
//! share a port.

use std::collections::HashSet;
use std::net::{TcpListener, UdpSocket};
use std::sync::Mutex;

use rand::Rng;
use shadowbox_types::ShadowboxError;

const MIN_PORT: u16 = 1024;
const MAX_RESERVE_ATTEMPTS: u32 = 100;

/// Tracks ports this server has claimed, de-duplicating reservation checks
/// against its own reserved set before ever touching the OS.
pub struct PortProvider {
    reserved: Mutex<HashSet<u16>>,
}

impl Default for PortProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PortProvider {
    pub fn new() -> Self {
        Self { reserved: Mutex::new(HashSet::new()) }
    }

    /// Seed the provider with ports already owned by persisted access keys,
    /// e.g. on startup before the repository's first enforcement tick.
    pub fn seed(&self, ports: impl IntoIterator<Item = u16>) {
        let mut reserved = self.reserved.lock().unwrap();
        reserved.extend(ports);
    }

    /// Reserve a specific port. Succeeds without probing if this server
    /// already owns the port (keys may share a port); otherwise probes the
    /// OS and fails `PortUnavailable` if something else is listening.
    pub fn reserve(&self, port: u16) -> Result<(), ShadowboxError> {
        let mut reserved = self.reserved.lock().unwrap();
        if reserved.contains(&port) {
            return Ok(());
        }
        if is_port_listening(port) {
            return Err(ShadowboxError::PortUnavailable { port });
        }
        reserved.insert(port);
        Ok(())
    }

    /// Reserve the first free port at or after `start`.
    pub fn reserve_first_free(&self, start: u16) -> Result<u16, ShadowboxError> {
        let mut port = start.max(MIN_PORT);
        loop {
            if self.reserve(port).is_ok() {
                return Ok(port);
            }
            port = match port.checked_add(1) {
                Some(p) => p,
                None => {
                    return Err(ShadowboxError::PortUnavailable { port });
                },
            };
        }
    }

    /// Reserve a random free port in `[1024, 65535]`.
    pub fn reserve_new(&self) -> Result<u16, ShadowboxError> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let port = rng.gen_range(MIN_PORT..=u16::MAX);
            if self.reserve(port).is_ok() {
                return Ok(port);
            }
        }
        Err(ShadowboxError::PortUnavailable { port: 0 })
    }

    /// Release a port from the reserved set. Does not affect whatever is
    /// actually listening on it — the caller is responsible for having
    /// stopped using it first.
    pub fn free(&self, port: u16) {
        self.reserved.lock().unwrap().remove(&port);
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved.lock().unwrap().contains(&port)
    }
}

/// True if something is already listening on `port`, probed by attempting to
/// bind both a TCP and a UDP socket and releasing immediately on success.
fn is_port_listening(port: u16) -> bool {
    let tcp_free = TcpListener::bind(("0.0.0.0", port)).is_ok();
    let udp_free = UdpSocket::bind(("0.0.0.0", port)).is_ok();
    !(tcp_free && udp_free)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_first_free_skips_occupied_ports() {
        let provider = PortProvider::new();
        provider.seed([40000, 40001]);
        let port = provider.reserve_first_free(40000).unwrap();
        assert_eq!(port, 40002);
    }

    #[test]
    fn reserve_rejects_port_held_by_foreign_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let provider = PortProvider::new();
        let err = provider.reserve(port).unwrap_err();
        assert_eq!(err, ShadowboxError::PortUnavailable { port });
    }

    #[test]
    fn reserve_is_idempotent_for_already_owned_ports() {
        let provider = PortProvider::new();
        provider.reserve(50123).unwrap();
        // A second reservation of the same port succeeds: keys may share ports.
        provider.reserve(50123).unwrap();
    }

    #[test]
    fn free_allows_the_port_to_be_reprobed() {
        let provider = PortProvider::new();
        provider.reserve(50124).unwrap();
        provider.free(50124);
        assert!(!provider.is_reserved(50124));
    }
}
