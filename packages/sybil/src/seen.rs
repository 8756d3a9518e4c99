use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};

/// Remembers when a `SocketAddrV4` was last offered to the routing
/// table, so a contact that keeps reappearing in `nodes` lists from
/// several different peers within the same window isn't re-inserted (and
/// doesn't refresh its FIFO position) every time.
pub struct SeenWindow {
    window: Duration,
    last_seen: HashMap<SocketAddrV4, Instant>,
}

impl SeenWindow {
    pub fn new(window: Duration) -> SeenWindow {
        SeenWindow {
            window,
            last_seen: HashMap::new(),
        }
    }

    /// Returns `true` the first time `addr` is observed within the
    /// current window, `false` on a repeat. Prunes stale entries
    /// opportunistically on every call so the map never grows unbounded.
    pub fn observe(&mut self, addr: SocketAddrV4, now: Instant) -> bool {
        self.last_seen.retain(|_, seen_at| now.saturating_duration_since(*seen_at) < self.window);

        if let Some(seen_at) = self.last_seen.get(&addr) {
            if now.saturating_duration_since(*seen_at) < self.window {
                return false;
            }
        }
        self.last_seen.insert(addr, now);
        true
    }
}
