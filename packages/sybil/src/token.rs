use std::net::Ipv4Addr;

use sha1::{Digest, Sha1};

/// Issues and checks the 2-byte `get_peers` token BEP-5 requires a node
/// to hand back unchanged in a subsequent `announce_peer`. Derived from
/// the requester's IP and a process-lifetime secret so we don't need to
/// remember anything per-peer: any `announce_peer` presenting the token
/// we'd issue right now for that IP is accepted.
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn generate() -> TokenSecret {
        TokenSecret(rand::random::<[u8; 20]>().to_vec())
    }

    pub fn issue(&self, ip: Ipv4Addr) -> [u8; 2] {
        let mut hasher = Sha1::new();
        hasher.update(&self.0);
        hasher.update(ip.octets());
        let digest = hasher.finalize();
        [digest[0], digest[1]]
    }

    pub fn verify(&self, ip: Ipv4Addr, token: &[u8]) -> bool {
        token.len() == 2 && token == self.issue(ip)
    }
}
