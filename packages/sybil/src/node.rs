use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use infohash_filter::Filter;
use krpc_protocol::NodeID;
use routing_table::RoutingTable;
use transport::{IncomingQuery, Transport};

use crate::config::Config;
use crate::seen::SeenWindow;
use crate::token::TokenSecret;

/// Published to the fetcher pool whenever an `announce_peer` reveals a
/// not-previously-seen infohash.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest {
    pub info_hash: NodeID,
    pub peer: SocketAddrV4,
}

/// A single Sybil identity: one UDP socket, one routing table, one
/// aliasing identity. Owns nothing about persistence or metadata
/// fetching directly; it only ever talks to the rest of the crawler
/// through `filter` (is this infohash worth fetching) and `fetch_tx`
/// (hand the fetch off to the pool).
pub struct SybilNode {
    pub(crate) own_id: NodeID,
    pub(crate) transport: Arc<Transport>,
    pub(crate) routing_table: Mutex<RoutingTable>,
    pub(crate) filter: Arc<Filter>,
    pub(crate) fetch_tx: mpsc::Sender<FetchRequest>,
    pub(crate) token_secret: TokenSecret,
    pub(crate) seen: Mutex<SeenWindow>,
    pub(crate) config: Config,
}

impl SybilNode {
    pub async fn bind(
        addr: SocketAddr,
        own_id: NodeID,
        filter: Arc<Filter>,
        fetch_tx: mpsc::Sender<FetchRequest>,
        config: Config,
    ) -> transport::Result<Arc<SybilNode>> {
        let transport = Transport::bind(addr, config.exclusions.clone()).await?;
        Ok(Arc::new(SybilNode {
            own_id,
            transport: Arc::new(transport),
            routing_table: Mutex::new(RoutingTable::new(config.max_neighbours)),
            filter,
            fetch_tx,
            token_secret: TokenSecret::generate(),
            seen: Mutex::new(SeenWindow::new(config.seen_window)),
            config,
        }))
    }

    pub fn own_id(&self) -> NodeID {
        self.own_id
    }

    pub async fn routing_table_len(&self) -> usize {
        self.routing_table.lock().await.len()
    }

    /// Runs the node until `shutdown` is cancelled: bootstraps, then
    /// drives the incoming-query dispatcher and the outgoing pollination
    /// ticker concurrently. Mirrors the orderly-shutdown sequence of
    /// spec.md §5: stop accepting new datagrams, cancel pollination,
    /// let in-flight sends finish.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        crate::bootstrap::bootstrap(&self).await;

        let sweeper = self.transport.clone().spawn_sweeper(std::time::Duration::from_secs(5));

        let (incoming_tx, incoming_rx) = mpsc::channel(1024);
        let recv_transport = self.transport.clone();
        let recv_shutdown = shutdown.clone();
        let recv_task = tokio::spawn(async move {
            tokio::select! {
                _ = recv_shutdown.cancelled() => {}
                result = recv_transport.recv_loop(incoming_tx) => {
                    if let Err(err) = result {
                        warn!("transport recv loop ended: {}", err);
                    }
                }
            }
        });

        let dispatch_self = self.clone();
        let dispatch_shutdown = shutdown.clone();
        let dispatch_task = tokio::spawn(async move {
            dispatch_self.dispatch_loop(incoming_rx, dispatch_shutdown).await;
        });

        let pollination_self = self.clone();
        let pollination_shutdown = shutdown.clone();
        let pollination_task = tokio::spawn(async move {
            crate::pollination::run(pollination_self, pollination_shutdown).await;
        });

        shutdown.cancelled().await;
        info!("sybil node shutting down");
        sweeper.abort();
        let _ = recv_task.await;
        let _ = dispatch_task.await;
        let _ = pollination_task.await;
    }

    async fn dispatch_loop(self: Arc<Self>, mut incoming: mpsc::Receiver<IncomingQuery>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                incoming_query = incoming.recv() => {
                    let Some(incoming_query) = incoming_query else { return };
                    let node = self.clone();
                    tokio::spawn(async move {
                        node.handle_incoming(incoming_query).await;
                    });
                }
            }
        }
    }

    async fn handle_incoming(&self, incoming: IncomingQuery) {
        debug!("{} from {}", incoming.query.name(), incoming.from);
        let outcome = self.handle_query(&incoming.query, incoming.from).await;
        let send_result = match outcome {
            Ok(response) => {
                self.transport
                    .respond(incoming.transaction_id, response, incoming.from)
                    .await
            }
            Err(error) => {
                self.transport
                    .respond_error(incoming.transaction_id, error, incoming.from)
                    .await
            }
        };
        if let Err(err) = send_result {
            warn!("failed to reply to {}: {}", incoming.from, err);
        }
    }

    /// Inserts newly learned contacts (from a `find_node`/`get_peers`
    /// response's compact `nodes`) into the routing table, subject to
    /// the exclusion list, the dedup window, and the table's capacity
    /// cap (dropped, not churned, once full — spec.md §4.5).
    pub(crate) async fn ingest_nodes(&self, nodes: &[krpc_protocol::NodeInfo]) {
        let now = std::time::Instant::now();
        let mut seen = self.seen.lock().await;
        let mut table = self.routing_table.lock().await;
        for node in nodes {
            let addr = SocketAddrV4::new(*node.addr.ip(), node.addr.port());
            if self.config.exclusions.is_excluded(*addr.ip()) {
                continue;
            }
            if addr.ip() == &Ipv4Addr::UNSPECIFIED || addr.port() == 0 {
                continue;
            }
            if !seen.observe(addr, now) {
                continue;
            }
            table.insert_if_room(routing_table::Contact::new(node.id, addr));
        }
    }
}
