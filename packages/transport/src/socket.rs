use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use krpc_protocol::{Envelope, KRPCError, MessageType, Query, Response};

use crate::active_transactions::{ActiveTransactions, DEFAULT_TIMEOUT};
use crate::cidr::ExclusionList;
use crate::errors::{Error, Result};
use crate::transaction::{TransactionId, TransactionIdGenerator};

/// Send/receive buffer size, matching the original crawler's generous
/// allowance for absorbing bursts of DHT traffic without drops.
const SOCKET_BUFFER_SIZE: usize = 5_000_000;

/// Largest UDP datagram worth decoding; anything bigger cannot be a KRPC
/// message and is dropped before even reaching the bencode decoder.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// A query received from a remote node, handed to the Sybil dispatcher.
#[derive(Debug)]
pub struct IncomingQuery {
    pub query: Query,
    pub transaction_id: Vec<u8>,
    pub from: SocketAddrV4,
    pub read_only: bool,
}

/// Single non-blocking UDP socket carrying KRPC traffic, with per-query
/// transaction correlation and source-address filtering.
pub struct Transport {
    socket: UdpSocket,
    transactions: ActiveTransactions,
    tid_gen: TransactionIdGenerator,
    exclusions: ExclusionList,
    malformed_count: AtomicU64,
}

impl Transport {
    pub async fn bind(addr: SocketAddr, exclusions: ExclusionList) -> Result<Transport> {
        let domain = match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, None)?;
        socket.set_nonblocking(true)?;
        socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;
        socket.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;
        socket.bind(&addr.into())?;

        let socket = UdpSocket::from_std(socket.into())?;

        Ok(Transport {
            socket,
            transactions: ActiveTransactions::new(),
            tid_gen: TransactionIdGenerator::new(),
            exclusions,
            malformed_count: AtomicU64::new(0),
        })
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed_count.load(Ordering::Relaxed)
    }

    pub fn active_transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Sends a query and awaits its matching response, or times out.
    pub async fn query(&self, query: Query, to: SocketAddrV4) -> Result<Response> {
        let tid = self.tid_gen.next();
        let rx = self.transactions.register(tid, DEFAULT_TIMEOUT);

        let envelope = Envelope {
            transaction_id: tid.to_bytes().to_vec(),
            version: None,
            read_only: false,
            message_type: MessageType::Query { query },
        };
        let bytes = envelope.encode()?;
        self.socket.send_to(&bytes, SocketAddr::V4(to)).await?;

        match rx.await {
            Ok(envelope) => match envelope.message_type {
                MessageType::Response { response } => Ok(response),
                MessageType::Error { error } => Err(Error::Rejected(error)),
                MessageType::Query { .. } => Err(Error::Protocol(krpc_protocol::Error::ProtocolViolation {
                    expected: "response",
                })),
            },
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Replies to a received query. No transaction state is retained for
    /// response sends.
    pub async fn respond(
        &self,
        transaction_id: Vec<u8>,
        response: Response,
        to: SocketAddrV4,
    ) -> Result<()> {
        let envelope = Envelope {
            transaction_id,
            version: None,
            read_only: false,
            message_type: MessageType::Response { response },
        };
        let bytes = envelope.encode()?;
        self.socket.send_to(&bytes, SocketAddr::V4(to)).await?;
        Ok(())
    }

    pub async fn respond_error(
        &self,
        transaction_id: Vec<u8>,
        error: KRPCError,
        to: SocketAddrV4,
    ) -> Result<()> {
        let envelope = Envelope {
            transaction_id,
            version: None,
            read_only: false,
            message_type: MessageType::Error { error },
        };
        let bytes = envelope.encode()?;
        self.socket.send_to(&bytes, SocketAddr::V4(to)).await?;
        Ok(())
    }

    /// Receives datagrams forever, matching responses to outstanding
    /// transactions and forwarding queries to `incoming`. Returns only on
    /// socket error; the caller decides whether that's fatal.
    pub async fn recv_loop(&self, incoming: mpsc::Sender<IncomingQuery>) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            let from = match from {
                SocketAddr::V4(v4) => v4,
                SocketAddr::V6(_) => continue,
            };
            if self.exclusions.is_excluded(*from.ip()) {
                trace!("dropping datagram from excluded source {}", from);
                continue;
            }

            let envelope = match Envelope::decode(&buf[..len]) {
                Ok(envelope) => envelope,
                Err(cause) => {
                    self.malformed_count.fetch_add(1, Ordering::Relaxed);
                    debug!("malformed datagram from {}: {}", from, cause);
                    continue;
                }
            };

            if matches!(envelope.message_type, MessageType::Query { .. }) {
                let transaction_id = envelope.transaction_id.clone();
                let read_only = envelope.read_only;
                if let MessageType::Query { query } = envelope.message_type {
                    let incoming_query = IncomingQuery {
                        query,
                        transaction_id,
                        from,
                        read_only,
                    };
                    if incoming.send(incoming_query).await.is_err() {
                        warn!("incoming query channel closed, dropping dispatcher");
                        return Ok(());
                    }
                }
            } else if let Some(tid) = TransactionId::from_bytes(&envelope.transaction_id) {
                self.transactions.complete(tid, envelope);
            } else {
                self.malformed_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Spawns the background timer that sweeps transactions past their
    /// deadline, dropping them silently.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let swept = self.transactions.sweep(std::time::Instant::now());
                if swept > 0 {
                    trace!("swept {} expired transactions", swept);
                }
            }
        })
    }
}

/// The unspecified local address used when no explicit host/port is
/// configured, mirroring the original crawler's `0.0.0.0` default.
pub fn any_v4(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use krpc_protocol::NodeID;

    #[tokio::test]
    async fn ping_round_trips_between_two_transports() {
        let a = Transport::bind(any_v4(0), ExclusionList::new(vec![])).await.unwrap();
        let b = Transport::bind(any_v4(0), ExclusionList::new(vec![])).await.unwrap();

        let a_addr = match a.socket.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        let b_addr = match b.socket.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };

        let (tx, mut rx) = mpsc::channel(8);
        let b = Arc::new(b);
        let b_clone = b.clone();
        tokio::spawn(async move {
            let _ = b_clone.recv_loop(tx).await;
        });

        let query_task = tokio::spawn(async move {
            let incoming = rx.recv().await.unwrap();
            assert_eq!(incoming.query.name(), "ping");
            b.respond(
                incoming.transaction_id,
                Response::OnlyID { id: NodeID([9u8; 20]) },
                incoming.from,
            )
            .await
            .unwrap();
        });

        let response = a
            .query(Query::Ping { id: NodeID([1u8; 20]) }, b_addr)
            .await
            .unwrap();
        assert_eq!(response.id(), NodeID([9u8; 20]));

        query_task.await.unwrap();
        let _ = a_addr;
    }
}
