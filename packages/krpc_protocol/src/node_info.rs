use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use byteorder::{BigEndian, ByteOrder};
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

use crate::node_id::NodeID;

/// A single entry of the compact `nodes` form: 20-byte NodeID followed by
/// a 6-byte compact address, 26 bytes total. Unlike `Addr`/`values`, every
/// `NodeInfo` in a response is packed into *one* concatenated bencode
/// string rather than a list of separate strings, so this type is only
/// ever (de)serialized through the `node_info` serde helper module below,
/// never on its own.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeID,
    pub addr: SocketAddrV4,
}

impl fmt::Debug for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeInfo({}, {})", self.id, self.addr)
    }
}

impl NodeInfo {
    pub const LEN: usize = 26;

    pub fn from_bytes(bytes: &[u8]) -> Option<NodeInfo> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let id = NodeID::from_slice(&bytes[0..20])?;
        let ip = Ipv4Addr::new(bytes[20], bytes[21], bytes[22], bytes[23]);
        let port = BigEndian::read_u16(&bytes[24..26]);
        Some(NodeInfo {
            id,
            addr: SocketAddrV4::new(ip, port),
        })
    }

    pub fn to_bytes(&self) -> [u8; 26] {
        let mut out = [0u8; 26];
        out[0..20].copy_from_slice(self.id.as_bytes());
        out[20..24].copy_from_slice(&self.addr.ip().octets());
        BigEndian::write_u16(&mut out[24..26], self.addr.port());
        out
    }
}

/// `#[serde(with = "node_info")]` helper: (de)serializes `Vec<NodeInfo>` as
/// the single packed compact-node-info bencode string BEP-5 specifies.
pub fn serialize<S: Serializer>(nodes: &[NodeInfo], serializer: S) -> Result<S::Ok, S::Error> {
    let mut bytes = Vec::with_capacity(nodes.len() * NodeInfo::LEN);
    for node in nodes {
        bytes.extend_from_slice(&node.to_bytes());
    }
    serializer.serialize_bytes(&bytes)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<NodeInfo>, D::Error> {
    struct NodesVisitor;

    impl<'de> Visitor<'de> for NodesVisitor {
        type Value = Vec<NodeInfo>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a packed compact-node-info string")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Vec<NodeInfo>, E> {
            if v.len() % NodeInfo::LEN != 0 {
                return Err(E::invalid_length(v.len(), &"a multiple of 26 bytes"));
            }
            Ok(v.chunks_exact(NodeInfo::LEN)
                .map(|chunk| NodeInfo::from_bytes(chunk).expect("chunk is exactly 26 bytes"))
                .collect())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Vec<NodeInfo>, E> {
            self.visit_bytes(&v)
        }
    }

    deserializer.deserialize_bytes(NodesVisitor)
}
