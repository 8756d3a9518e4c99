//! The metadata fetch pool: turns a stream of `(infohash, peer)`
//! candidates from one or more Sybil nodes into verified raw `info`
//! dictionaries, bounded by a per-infohash concurrency cap and a global
//! session ceiling, cancelling sibling sessions the moment one succeeds.

mod config;
mod job;
mod pool;

pub use config::{Config, MAX_ACTIVE_PEERS_PER_INFO_HASH, PEER_QUEUE_CAPACITY};
pub use pool::{FetchRequest, FetchedMetadata, Pool};
