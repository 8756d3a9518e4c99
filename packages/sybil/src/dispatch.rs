use std::net::SocketAddrV4;

use log::{debug, warn};

use krpc_protocol::{KRPCError, NodeInfo, Query, Response};

use crate::alias::alias;
use crate::node::{FetchRequest, SybilNode};

/// How many synthetic contacts go out in a `find_node`/`get_peers` reply.
const REPLY_NODE_COUNT: usize = 8;

impl SybilNode {
    /// Builds the response for one incoming query, per the table in
    /// spec.md §4.5. Never panics on a malformed-but-well-typed query;
    /// `krpc_protocol` has already rejected anything that doesn't parse.
    pub(crate) async fn handle_query(&self, query: &Query, from: SocketAddrV4) -> Result<Response, KRPCError> {
        match query {
            Query::Ping { id } => Ok(Response::OnlyID { id: alias(id, &self.own_id) }),

            Query::FindNode { .. } => Ok(Response::NextHop {
                id: self.own_id,
                token: None,
                nodes: self.sample_nodes().await,
            }),

            Query::GetPeers { info_hash, .. } => {
                debug!("get_peers revealed info_hash {}", info_hash);
                let token = self.token_secret.issue(*from.ip());
                Ok(Response::NextHop {
                    id: alias(info_hash, &self.own_id),
                    token: Some(serde_bytes::ByteBuf::from(token.to_vec())),
                    nodes: self.sample_nodes().await,
                })
            }

            Query::AnnouncePeer {
                info_hash,
                implied_port,
                port,
                token,
                ..
            } => {
                if !self.token_secret.verify(*from.ip(), token) {
                    debug!("announce_peer from {} presented an unrecognised token", from);
                }
                let peer_port = if *implied_port { from.port() } else { port.unwrap_or(from.port()) };
                let peer = SocketAddrV4::new(*from.ip(), peer_port);
                self.note_announce(*info_hash, peer).await;
                Ok(Response::OnlyID { id: alias(info_hash, &self.own_id) })
            }

            // BEP-51; we have no infohash sample worth offering and no
            // legitimate use for answering it, so the Sybil declines
            // rather than fabricate one.
            Query::SampleInfoHashes { .. } => Err(KRPCError::new(KRPCError::METHOD_UNKNOWN, "method unknown")),
        }
    }

    async fn sample_nodes(&self) -> Vec<NodeInfo> {
        let table = self.routing_table.lock().await;
        table
            .sample(REPLY_NODE_COUNT)
            .into_iter()
            .map(|contact| NodeInfo {
                id: contact.id,
                addr: contact.addr,
            })
            .collect()
    }

    /// If `info_hash` hasn't been seen before, publishes a `FetchRequest`
    /// for the fetcher pool to pick up. `try_send` rather than `send`:
    /// the queue overflowing means the pool is already saturated, and
    /// spec.md §4.7 calls for sampling new requests away under load
    /// rather than queuing unboundedly.
    async fn note_announce(&self, info_hash: krpc_protocol::NodeID, peer: SocketAddrV4) {
        if self.filter.is_new(&info_hash).await {
            let request = FetchRequest { info_hash, peer };
            if self.fetch_tx.try_send(request).is_err() {
                warn!("fetch queue saturated, dropping FetchRequest for {}", info_hash);
            }
        }
    }
}
