use std::collections::HashSet;
use std::sync::Arc;

use log::warn;
use tokio::sync::Mutex;

use krpc_protocol::NodeID;

use crate::cache::MemcacheClient;
use crate::durable::DurableStore;
use crate::errors::Result;

fn base32_key(info_hash: &NodeID) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, info_hash.as_bytes())
}

/// `is_new(h)` contract: an infohash is new unless it has already been
/// seen in the current pending batch, exists in the durable store, or is
/// known to the optional external cache. Backend failures are treated as
/// "assume new" by the caller (see `is_new`'s doc), never surfaced as a
/// hard error that would make the crawler drop real discoveries.
pub struct Filter {
    pending: Mutex<HashSet<NodeID>>,
    durable: Arc<dyn DurableStore>,
    cache: Option<MemcacheClient>,
}

impl Filter {
    pub fn new(durable: Arc<dyn DurableStore>, cache: Option<MemcacheClient>) -> Filter {
        Filter {
            pending: Mutex::new(HashSet::new()),
            durable,
            cache,
        }
    }

    /// Returns whether `info_hash` has not yet been seen. On a positive
    /// result the hash is recorded in the in-memory pending set so a
    /// second `get_peers`/`announce_peer` for the same hash before the
    /// next commit doesn't re-trigger a fetch. Callers should invoke
    /// `clear_pending` once the durable store has actually committed it,
    /// after which `contains_info_hash` makes the pending entry
    /// redundant anyway.
    pub async fn is_new(&self, info_hash: &NodeID) -> bool {
        {
            let pending = self.pending.lock().await;
            if pending.contains(info_hash) {
                return false;
            }
        }

        match self.durable.contains_info_hash(info_hash).await {
            Ok(true) => return false,
            Ok(false) => {}
            Err(err) => {
                warn!("durable store unavailable, assuming {} is new: {}", info_hash, err);
            }
        }

        if let Some(cache) = &self.cache {
            match cache.contains(&base32_key(info_hash)).await {
                Ok(true) => return false,
                Ok(false) => {}
                Err(err) => {
                    warn!("external cache unavailable, assuming {} is new: {}", info_hash, err);
                }
            }
        }

        self.pending.lock().await.insert(*info_hash);
        true
    }

    pub async fn clear_pending(&self, info_hashes: &[NodeID]) {
        let mut pending = self.pending.lock().await;
        for hash in info_hashes {
            pending.remove(hash);
        }
    }

    /// Warm-up mode: iterates the durable store in blocks, pushing
    /// base32-encoded infohash keys into the external cache, then
    /// returns. A no-op if no cache is configured.
    pub async fn heat_cache(&self, chunk_size: usize) -> Result<usize> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return Ok(0),
        };

        let mut warmed = 0;
        for block in self.durable.all_info_hashes(chunk_size).await? {
            for info_hash in &block {
                cache.insert(&base32_key(info_hash)).await?;
                warmed += 1;
            }
        }
        Ok(warmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct FakeDurableStore {
        known: StdMutex<HashSet<NodeID>>,
    }

    #[async_trait]
    impl DurableStore for FakeDurableStore {
        async fn contains_info_hash(&self, info_hash: &NodeID) -> Result<bool> {
            Ok(self.known.lock().unwrap().contains(info_hash))
        }

        async fn all_info_hashes(&self, _chunk_size: usize) -> Result<Vec<Vec<NodeID>>> {
            Ok(vec![self.known.lock().unwrap().iter().copied().collect()])
        }
    }

    fn hash(byte: u8) -> NodeID {
        NodeID([byte; 20])
    }

    #[tokio::test]
    async fn first_sighting_is_new_second_is_not() {
        let durable = Arc::new(FakeDurableStore { known: StdMutex::new(HashSet::new()) });
        let filter = Filter::new(durable, None);

        assert!(filter.is_new(&hash(1)).await);
        assert!(!filter.is_new(&hash(1)).await);
    }

    #[tokio::test]
    async fn known_to_durable_store_is_not_new() {
        let mut known = HashSet::new();
        known.insert(hash(2));
        let durable = Arc::new(FakeDurableStore { known: StdMutex::new(known) });
        let filter = Filter::new(durable, None);

        assert!(!filter.is_new(&hash(2)).await);
    }

    #[tokio::test]
    async fn clear_pending_allows_resighting_if_never_committed() {
        let durable = Arc::new(FakeDurableStore { known: StdMutex::new(HashSet::new()) });
        let filter = Filter::new(durable, None);

        assert!(filter.is_new(&hash(3)).await);
        assert!(!filter.is_new(&hash(3)).await);
        filter.clear_pending(&[hash(3)]).await;
        assert!(filter.is_new(&hash(3)).await);
    }
}
