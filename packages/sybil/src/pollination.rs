use std::sync::Arc;

use log::trace;
use tokio_util::sync::CancellationToken;

use krpc_protocol::{NodeID, Query, Response};

use crate::alias::alias;
use crate::node::SybilNode;

/// Drains a batch of contacts from the routing table at a fixed tick and
/// sends each one a `find_node` for a random target. Every reply's
/// `nodes` list replenishes the table, which is the entire point: the
/// Sybil has no lookup work of its own to do, it only needs a steady
/// rotating supply of plausible-looking targets to advertise itself to.
pub async fn run(node: Arc<SybilNode>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(node.config.pollination_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => pollinate_once(&node).await,
        }
    }
}

async fn pollinate_once(node: &Arc<SybilNode>) {
    let batch = {
        let table = node.routing_table.lock().await;
        table.sample(node.config.pollination_batch)
    };

    for contact in batch {
        let node = node.clone();
        tokio::spawn(async move {
            let target = NodeID(rand::random());
            let query_id = alias(&target, &node.own_id);
            let result = node
                .transport
                .query(Query::FindNode { id: query_id, target }, contact.addr)
                .await;
            match result {
                Ok(Response::NextHop { nodes, .. }) => node.ingest_nodes(&nodes).await,
                Ok(_) => {}
                Err(err) => trace!("find_node to {} failed: {}", contact.addr, err),
            }
        });
    }
}
