use std::time::Duration;

use transport::ExclusionList;

/// Tunables for a single `SybilNode`. One instance of this (and one
/// `SybilNode`) exists per bound UDP port; §9's "Open Questions" retains
/// per-port fan-out, so a multi-port deployment constructs one `Config`
/// per node, typically identical apart from the bound port itself.
#[derive(Clone)]
pub struct Config {
    pub max_neighbours: usize,
    pub pollination_interval: Duration,
    pub pollination_batch: usize,
    pub bootstrap_hosts: Vec<String>,
    pub seen_window: Duration,
    pub exclusions: ExclusionList,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_neighbours: 2000,
            pollination_interval: Duration::from_millis(100),
            pollination_batch: 8,
            bootstrap_hosts: vec![
                "router.bittorrent.com:6881".to_string(),
                "dht.transmissionbt.com:6881".to_string(),
            ],
            seen_window: Duration::from_secs(300),
            exclusions: ExclusionList::default(),
        }
    }
}
