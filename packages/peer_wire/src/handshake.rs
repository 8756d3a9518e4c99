use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::{Error, Result};

const PROTOCOL: &[u8] = b"BitTorrent protocol";
const LEN: usize = 49 + PROTOCOL.len();

/// BEP-3 reserved bit for the BEP-10 extension protocol: bit 20 counting
/// from the low end of the 8-byte reserved field, i.e. bit 0x10 of the
/// 6th byte.
const EXTENSION_BIT: u8 = 0x10;
const EXTENSION_BYTE: usize = 5;

/// The 68-byte BitTorrent handshake: protocol name, 8 reserved bytes,
/// 20-byte infohash, 20-byte peer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Handshake {
        let mut reserved = [0u8; 8];
        reserved[EXTENSION_BYTE] |= EXTENSION_BIT;
        Handshake { reserved, info_hash, peer_id }
    }

    pub fn supports_extensions(&self) -> bool {
        self.reserved[EXTENSION_BYTE] & EXTENSION_BIT != 0
    }

    pub fn to_bytes(&self) -> [u8; LEN] {
        let mut out = [0u8; LEN];
        out[0] = PROTOCOL.len() as u8;
        out[1..1 + PROTOCOL.len()].copy_from_slice(PROTOCOL);
        let mut offset = 1 + PROTOCOL.len();
        out[offset..offset + 8].copy_from_slice(&self.reserved);
        offset += 8;
        out[offset..offset + 20].copy_from_slice(&self.info_hash);
        offset += 20;
        out[offset..offset + 20].copy_from_slice(&self.peer_id);
        out
    }

    pub fn from_bytes(bytes: &[u8; LEN]) -> Handshake {
        let mut reserved = [0u8; 8];
        let mut info_hash = [0u8; 20];
        let mut peer_id = [0u8; 20];
        let mut offset = 1 + PROTOCOL.len();
        reserved.copy_from_slice(&bytes[offset..offset + 8]);
        offset += 8;
        info_hash.copy_from_slice(&bytes[offset..offset + 20]);
        offset += 20;
        peer_id.copy_from_slice(&bytes[offset..offset + 20]);
        Handshake { reserved, info_hash, peer_id }
    }
}

pub async fn perform<S>(stream: &mut S, info_hash: [u8; 20], own_peer_id: [u8; 20]) -> Result<Handshake>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let outgoing = Handshake::new(info_hash, own_peer_id);
    stream.write_all(&outgoing.to_bytes()).await?;

    let mut buf = [0u8; LEN];
    stream.read_exact(&mut buf).await?;
    if buf[0] as usize != PROTOCOL.len() || &buf[1..1 + PROTOCOL.len()] != PROTOCOL {
        return Err(Error::HandshakeMismatch);
    }

    let peer_handshake = Handshake::from_bytes(&buf);
    if peer_handshake.info_hash != info_hash {
        return Err(Error::HandshakeMismatch);
    }
    if !peer_handshake.supports_extensions() {
        return Err(Error::NoExtensionSupport);
    }
    Ok(peer_handshake)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let handshake = Handshake::new([1u8; 20], [2u8; 20]);
        let bytes = handshake.to_bytes();
        assert_eq!(Handshake::from_bytes(&bytes), handshake);
    }

    #[test]
    fn sets_the_extension_protocol_bit() {
        let handshake = Handshake::new([0u8; 20], [0u8; 20]);
        assert!(handshake.supports_extensions());
    }
}
