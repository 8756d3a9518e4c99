use async_trait::async_trait;
use krpc_protocol::NodeID;

use crate::errors::Result;

/// The durable backing store's view of which infohashes it has already
/// committed. Implemented by `persistence::Database`; kept as a trait
/// here so this crate never has to depend on the database layer itself.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn contains_info_hash(&self, info_hash: &NodeID) -> Result<bool>;

    /// Iterates every known infohash in blocks of `chunk_size`, used only
    /// by warm-up mode to prime an external cache.
    async fn all_info_hashes(&self, chunk_size: usize) -> Result<Vec<Vec<NodeID>>>;
}
