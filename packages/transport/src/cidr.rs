//! Minimal IPv4 CIDR matching for source-address filtering. Just enough to
//! express the default exclusion list (private + CGNAT ranges); not a
//! general-purpose network library.

use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy)]
pub struct Cidr {
    network: u32,
    mask: u32,
}

impl Cidr {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Cidr {
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len as u32)
        };
        Cidr {
            network: u32::from(network) & mask,
            mask,
        }
    }

    /// Parses `"a.b.c.d/n"`. Panics on malformed input; only ever called
    /// with the hardcoded default list or validated CLI input.
    pub fn parse(s: &str) -> Cidr {
        let (addr, prefix) = s.split_once('/').expect("cidr must contain '/'");
        let network: Ipv4Addr = addr.parse().expect("invalid cidr network address");
        let prefix_len: u8 = prefix.parse().expect("invalid cidr prefix length");
        Cidr::new(network, prefix_len)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(ip) & self.mask) == self.network
    }
}

/// Source addresses the transport silently drops packets from. Defaults
/// to RFC-1918 private ranges plus the CGNAT `100.64.0.0/10` block, same
/// as the crawler this is modeled on: DHT traffic from these ranges is
/// never a real internet peer and only pollutes the routing table.
#[derive(Debug, Clone)]
pub struct ExclusionList {
    ranges: Vec<Cidr>,
}

impl ExclusionList {
    pub fn new(ranges: Vec<Cidr>) -> ExclusionList {
        ExclusionList { ranges }
    }

    pub fn is_excluded(&self, ip: Ipv4Addr) -> bool {
        self.ranges.iter().any(|cidr| cidr.contains(ip))
    }
}

impl Default for ExclusionList {
    fn default() -> ExclusionList {
        ExclusionList::new(
            ["100.64.0.0/10", "10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]
                .iter()
                .map(|s| Cidr::parse(s))
                .collect(),
        )
    }
}
