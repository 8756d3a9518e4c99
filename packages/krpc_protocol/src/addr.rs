use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use byteorder::{BigEndian, ByteOrder};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compact peer contact: 4-byte IPv4 address followed by a 2-byte
/// big-endian port (BEP-5's "compact IP-address/port info"). Each `Addr`
/// is its own bencode byte-string inside a `values` list — unlike `nodes`,
/// which concatenates all entries into a single string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Addr(pub SocketAddrV4);

impl Addr {
    pub const LEN: usize = 6;

    pub fn from_bytes(bytes: &[u8]) -> Option<Addr> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = BigEndian::read_u16(&bytes[4..6]);
        Some(Addr(SocketAddrV4::new(ip, port)))
    }

    pub fn to_bytes(self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0..4].copy_from_slice(&self.0.ip().octets());
        BigEndian::write_u16(&mut out[4..6], self.0.port());
        out
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Addr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Addr, D::Error> {
        struct AddrVisitor;

        impl<'de> Visitor<'de> for AddrVisitor {
            type Value = Addr;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a 6-byte compact peer address")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Addr, E> {
                Addr::from_bytes(v).ok_or_else(|| E::invalid_length(v.len(), &"6 bytes"))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Addr, E> {
                self.visit_bytes(&v)
            }
        }

        deserializer.deserialize_bytes(AddrVisitor)
    }
}
