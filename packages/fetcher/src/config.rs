use std::time::Duration;

/// Hard per-infohash ceiling on concurrent peer sessions (spec.md §4.7).
pub const MAX_ACTIVE_PEERS_PER_INFO_HASH: usize = 5;

/// How many candidate peers a single `FetchJob` will hold onto before it
/// starts dropping the oldest to make room for fresher ones.
pub const PEER_QUEUE_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Config {
    pub max_active_peers_per_info_hash: usize,
    pub global_cap: usize,
    pub fetch_job_timeout: Duration,
    pub recently_tried_window: Duration,
    pub max_metadata_size: i64,
    pub own_peer_id: [u8; 20],
}

impl Config {
    /// `global_cap` has no universally-right default; spec.md §4.7 says
    /// it is "derived from `max_neighbours`" — callers building the
    /// production pool should pass that through explicitly rather than
    /// rely on this fallback, which only exists for tests and ad-hoc use.
    pub fn new(global_cap: usize, own_peer_id: [u8; 20]) -> Config {
        Config {
            max_active_peers_per_info_hash: MAX_ACTIVE_PEERS_PER_INFO_HASH,
            global_cap,
            fetch_job_timeout: Duration::from_secs(60),
            recently_tried_window: Duration::from_secs(3600),
            max_metadata_size: 10 * 1024 * 1024,
            own_peer_id,
        }
    }
}
