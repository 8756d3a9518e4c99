use serde::{Deserialize, Serialize};
use std::fmt;

use crate::addr::Addr;
use crate::booleans;
use crate::errors::{Error, Result};
use crate::node_id::NodeID;
use crate::node_info::{self, NodeInfo};

/// Envelope holding information common to queries, responses and errors.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Transaction ID generated by the querying node and echoed back in the
    /// response. Used to correlate requests and responses; kept as raw
    /// bytes on the wire (two bytes by convention here, see
    /// `transport::TransactionId`) since BEP-5 does not fix a width.
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: Vec<u8>,

    /// Client version string.
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_bytes::ByteBuf>,

    #[serde(flatten)]
    pub message_type: MessageType,

    /// Sent by read-only DHT nodes, BEP-43. The Sybil never sets this: it
    /// very much wants to be queried.
    #[serde(
        rename = "ro",
        default,
        skip_serializing_if = "booleans::is_false",
        deserialize_with = "booleans::deserialize"
    )]
    pub read_only: bool,
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> Result<Envelope> {
        serde_bencode::de::from_bytes(bytes).map_err(|cause| Error::DecodeError { cause })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_bencode::ser::to_bytes(self).map_err(|cause| Error::EncodeError { cause })
    }
}

/// The three shapes a KRPC message can take, tagged by the `y` field.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "y")]
pub enum MessageType {
    #[serde(rename = "q")]
    Query {
        #[serde(flatten)]
        query: Query,
    },

    #[serde(rename = "r")]
    Response {
        #[serde(rename = "r")]
        response: Response,
    },

    #[serde(rename = "e")]
    Error {
        #[serde(rename = "e")]
        error: KRPCError,
    },
}

/// Error sent when a query cannot be fulfilled. `(code, message)`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct KRPCError(pub u32, pub String);

impl KRPCError {
    pub const GENERIC: u32 = 201;
    pub const SERVER: u32 = 202;
    pub const PROTOCOL: u32 = 203;
    pub const METHOD_UNKNOWN: u32 = 204;

    pub fn new(code: u32, message: impl Into<String>) -> KRPCError {
        KRPCError(code, message.into())
    }
}

impl fmt::Display for KRPCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0, self.1)
    }
}

/// Queries a node can send or receive.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "q", content = "a")]
pub enum Query {
    #[serde(rename = "ping")]
    Ping { id: NodeID },

    #[serde(rename = "find_node")]
    FindNode { id: NodeID, target: NodeID },

    #[serde(rename = "get_peers")]
    GetPeers { id: NodeID, info_hash: NodeID },

    #[serde(rename = "announce_peer")]
    AnnouncePeer {
        id: NodeID,
        #[serde(default, deserialize_with = "booleans::deserialize")]
        implied_port: bool,
        port: Option<u16>,
        info_hash: NodeID,
        #[serde(with = "serde_bytes")]
        token: Vec<u8>,
    },

    /// BEP-51, kept for wire compatibility with modern clients that send
    /// it unsolicited; the Sybil node has nothing useful to answer with
    /// and responds with a `method unknown` error (see `sybil::dispatch`).
    #[serde(rename = "sample_infohashes")]
    SampleInfoHashes { id: NodeID, target: NodeID },
}

impl Query {
    pub fn id(&self) -> NodeID {
        match self {
            Query::Ping { id }
            | Query::FindNode { id, .. }
            | Query::GetPeers { id, .. }
            | Query::AnnouncePeer { id, .. }
            | Query::SampleInfoHashes { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Query::Ping { .. } => "ping",
            Query::FindNode { .. } => "find_node",
            Query::GetPeers { .. } => "get_peers",
            Query::AnnouncePeer { .. } => "announce_peer",
            Query::SampleInfoHashes { .. } => "sample_infohashes",
        }
    }
}

/// Responses a node can send or receive. Untagged: the shape alone (which
/// fields are present) disambiguates which query it answers, same as the
/// real protocol.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Response {
    GetPeers {
        id: NodeID,
        token: Option<serde_bytes::ByteBuf>,
        #[serde(rename = "values")]
        peers: Vec<Addr>,
    },

    NextHop {
        id: NodeID,
        token: Option<serde_bytes::ByteBuf>,
        #[serde(with = "node_info")]
        nodes: Vec<NodeInfo>,
    },

    OnlyID {
        id: NodeID,
    },
}

impl Response {
    pub fn id(&self) -> NodeID {
        match self {
            Response::GetPeers { id, .. } => *id,
            Response::NextHop { id, .. } => *id,
            Response::OnlyID { id } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_ping_query() {
        let envelope = Envelope {
            transaction_id: vec![0, 1],
            version: None,
            read_only: false,
            message_type: MessageType::Query {
                query: Query::Ping { id: NodeID([1u8; 20]) },
            },
        };
        let bytes = envelope.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn decodes_get_peers_query() {
        let hash = [0x41u8; 20];
        let id = [0x42u8; 20];
        let mut msg = Vec::new();
        msg.extend_from_slice(b"d1:ad2:id20:");
        msg.extend_from_slice(&id);
        msg.extend_from_slice(b"9:info_hash20:");
        msg.extend_from_slice(&hash);
        msg.extend_from_slice(b"e1:q9:get_peers1:t2:aa1:y1:qe");

        let envelope = Envelope::decode(&msg).unwrap();
        match envelope.message_type {
            MessageType::Query {
                query: Query::GetPeers { id: got_id, info_hash },
            } => {
                assert_eq!(got_id.as_bytes(), &id);
                assert_eq!(info_hash.as_bytes(), &hash);
            }
            other => panic!("unexpected message type: {:?}", other),
        }
    }
}
