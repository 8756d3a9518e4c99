use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 20-byte DHT identifier. Used both for `NodeID`s and for infohashes —
/// the wire shape is identical (a 20-byte bencode string) even though the
/// two have different meanings to the rest of the crawler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeID(pub [u8; 20]);

impl NodeID {
    pub const LEN: usize = 20;

    pub fn from_slice(bytes: &[u8]) -> Option<NodeID> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let mut id = [0u8; Self::LEN];
        id.copy_from_slice(bytes);
        Some(NodeID(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// XOR distance metric between two identifiers, as used throughout
    /// Kademlia to decide which of two nodes is "closer" to a target.
    pub fn distance(&self, other: &NodeID) -> [u8; 20] {
        let mut out = [0u8; 20];
        for i in 0..20 {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }
}

impl fmt::Debug for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID({})", hex(&self.0))
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Serialize for NodeID {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeID {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<NodeID, D::Error> {
        struct NodeIDVisitor;

        impl<'de> Visitor<'de> for NodeIDVisitor {
            type Value = NodeID;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a 20-byte string")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<NodeID, E> {
                NodeID::from_slice(v)
                    .ok_or_else(|| E::invalid_length(v.len(), &"20 bytes"))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<NodeID, E> {
                self.visit_bytes(&v)
            }
        }

        deserializer.deserialize_bytes(NodeIDVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_ids() {
        let a = NodeID([7u8; 20]);
        assert_eq!(a.distance(&a), [0u8; 20]);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(NodeID::from_slice(&[0u8; 19]).is_none());
    }
}
