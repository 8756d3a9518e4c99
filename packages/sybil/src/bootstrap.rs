use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, warn};

use krpc_protocol::{Query, Response};

use crate::node::SybilNode;

/// Sends `find_node(target = own_id)` to each configured bootstrap host,
/// as spec.md §4.5 requires on launch, folding any returned contacts
/// into the routing table so pollination has something to work with
/// immediately rather than waiting for the first unsolicited datagram.
pub async fn bootstrap(node: &Arc<SybilNode>) {
    for host in node.config.bootstrap_hosts.clone() {
        let resolved = match tokio::net::lookup_host(&host).await {
            Ok(addrs) => addrs,
            Err(err) => {
                warn!("failed to resolve bootstrap host {}: {}", host, err);
                continue;
            }
        };

        for addr in resolved {
            let SocketAddr::V4(v4) = addr else { continue };
            let node = node.clone();
            tokio::spawn(async move {
                let result = node
                    .transport
                    .query(
                        Query::FindNode {
                            id: node.own_id,
                            target: node.own_id,
                        },
                        v4,
                    )
                    .await;
                match result {
                    Ok(Response::NextHop { nodes, .. }) => {
                        debug!("bootstrap via {} returned {} nodes", v4, nodes.len());
                        node.ingest_nodes(&nodes).await;
                    }
                    Ok(_) => {}
                    Err(err) => warn!("bootstrap via {} failed: {}", v4, err),
                }
            });
        }
    }
}
