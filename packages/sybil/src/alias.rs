use krpc_protocol::NodeID;

/// Synthesises an outgoing NodeID that borrows `value`'s first 15 bytes
/// and `own_id`'s last 5. Used both ways: aliasing an infohash makes the
/// Sybil look XOR-closest to it (so `get_peers`/`announce_peer` lookups
/// route to us); aliasing a peer's own NodeID when replying to `ping`
/// makes us look closest to *them* specifically, for no reason other
/// than symmetry with how the rest of the crawler always replies with an
/// aliased identity rather than a fixed one.
pub fn alias(value: &NodeID, own_id: &NodeID) -> NodeID {
    let mut out = [0u8; 20];
    out[0..15].copy_from_slice(&value.as_bytes()[0..15]);
    out[15..20].copy_from_slice(&own_id.as_bytes()[15..20]);
    NodeID(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrows_high_order_bytes_from_value_and_low_order_from_own_id() {
        let own_id = NodeID([0x00; 20]);
        let info_hash = NodeID([0xFF; 20]);

        let aliased = alias(&info_hash, &own_id);

        let mut expected = [0xFFu8; 15].to_vec();
        expected.extend_from_slice(&[0x00u8; 5]);
        assert_eq!(aliased.as_bytes(), expected.as_slice());
    }

    #[test]
    fn alias_prefix_always_matches_source_value() {
        let own_id = NodeID([7u8; 20]);
        for seed in 0..=255u8 {
            let value = NodeID([seed; 20]);
            let aliased = alias(&value, &own_id);
            assert_eq!(&aliased.as_bytes()[0..15], &value.as_bytes()[0..15]);
            assert_eq!(&aliased.as_bytes()[15..20], &own_id.as_bytes()[15..20]);
        }
    }
}
