//! The Sybil DHT node: the protocol state machine that makes this
//! crawler what it is. It never performs a real Kademlia lookup; it
//! answers `ping`/`find_node`/`get_peers`/`announce_peer` queries with
//! an aliased NodeID chosen to make itself look XOR-closest to whatever
//! the requester is interested in, harvesting the `announce_peer`
//! traffic that results.

mod alias;
mod bootstrap;
mod config;
mod dispatch;
mod node;
mod pollination;
mod seen;
mod token;

pub use alias::alias;
pub use config::Config;
pub use node::{FetchRequest, SybilNode};

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::sync::Arc;

    use async_trait::async_trait;
    use krpc_protocol::{NodeID, Query, Response};
    use tokio::sync::mpsc;

    use super::*;

    struct EmptyDurableStore;

    #[async_trait]
    impl infohash_filter::DurableStore for EmptyDurableStore {
        async fn contains_info_hash(&self, _info_hash: &NodeID) -> infohash_filter::Result<bool> {
            Ok(false)
        }

        async fn all_info_hashes(&self, _chunk_size: usize) -> infohash_filter::Result<Vec<Vec<NodeID>>> {
            Ok(vec![])
        }
    }

    async fn node_with_local_socket() -> (Arc<SybilNode>, mpsc::Receiver<FetchRequest>) {
        let (fetch_tx, fetch_rx) = mpsc::channel(16);
        let filter = Arc::new(infohash_filter::Filter::new(Arc::new(EmptyDurableStore), None));
        let mut config = Config::default();
        config.bootstrap_hosts = vec![];

        let node = SybilNode::bind(
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)),
            NodeID([0u8; 20]),
            filter,
            fetch_tx,
            config,
        )
        .await
        .unwrap();

        (node, fetch_rx)
    }

    #[tokio::test]
    async fn ping_replies_with_aliased_id() {
        let (node, _fetch_rx) = node_with_local_socket().await;
        let requester_id = NodeID([0x11; 20]);

        let response = node
            .handle_query(&Query::Ping { id: requester_id }, SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 6881))
            .await
            .unwrap();

        assert_eq!(response.id(), alias(&requester_id, &node.own_id()));
    }

    #[tokio::test]
    async fn get_peers_reply_aliases_the_info_hash_and_carries_a_two_byte_token() {
        let (node, _fetch_rx) = node_with_local_socket().await;
        let info_hash = NodeID([0xAB; 20]);

        let response = node
            .handle_query(
                &Query::GetPeers { id: NodeID([1u8; 20]), info_hash },
                SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 6881),
            )
            .await
            .unwrap();

        assert_eq!(response.id(), alias(&info_hash, &node.own_id()));
        match response {
            Response::NextHop { token, nodes, .. } => {
                assert_eq!(token.unwrap().len(), 2);
                assert!(nodes.len() % 1 == 0);
            }
            other => panic!("expected a NextHop response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn announce_peer_publishes_exactly_one_fetch_request() {
        let (node, mut fetch_rx) = node_with_local_socket().await;
        let info_hash = NodeID([0xCD; 20]);
        let from = SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 51413);

        let query = Query::AnnouncePeer {
            id: NodeID([2u8; 20]),
            implied_port: false,
            port: Some(6881),
            info_hash,
            token: vec![0, 0],
        };

        let response = node.handle_query(&query, from).await.unwrap();
        assert_eq!(response.id(), alias(&info_hash, &node.own_id()));

        let request = fetch_rx.try_recv().expect("expected a FetchRequest");
        assert_eq!(request.info_hash, info_hash);
        assert_eq!(request.peer, SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 6881));

        // A second announce for the same infohash within the pending
        // window must not enqueue a duplicate request.
        node.handle_query(&query, from).await.unwrap();
        assert!(fetch_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn announce_peer_honours_implied_port() {
        let (node, mut fetch_rx) = node_with_local_socket().await;
        let info_hash = NodeID([0xEE; 20]);
        let from = SocketAddrV4::new(Ipv4Addr::new(5, 6, 7, 8), 6881);

        let query = Query::AnnouncePeer {
            id: NodeID([3u8; 20]),
            implied_port: true,
            port: Some(9999),
            info_hash,
            token: vec![0, 0],
        };

        node.handle_query(&query, from).await.unwrap();
        let request = fetch_rx.try_recv().unwrap();
        assert_eq!(request.peer.port(), from.port());
    }

    #[tokio::test]
    async fn sample_infohashes_is_declined() {
        let (node, _fetch_rx) = node_with_local_socket().await;
        let err = node
            .handle_query(
                &Query::SampleInfoHashes { id: NodeID([1u8; 20]), target: NodeID([2u8; 20]) },
                SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 6881),
            )
            .await
            .unwrap_err();
        assert_eq!(err.0, krpc_protocol::KRPCError::METHOD_UNKNOWN);
    }

    #[tokio::test]
    async fn ingest_nodes_drops_excluded_and_unspecified_addresses() {
        let (node, _fetch_rx) = node_with_local_socket().await;

        let excluded = krpc_protocol::NodeInfo {
            id: NodeID([4u8; 20]),
            addr: SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 6881),
        };
        node.ingest_nodes(&[excluded]).await;
        assert_eq!(node.routing_table_len().await, 0);
    }
}
