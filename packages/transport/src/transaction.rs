use std::sync::atomic::{AtomicU16, Ordering};

/// A monotone counter truncated to two bytes, matching what goes on the
/// wire as the KRPC `t` field. Wraps freely: a transaction's lifetime
/// (one timeout, 15s default) is far shorter than the time it takes the
/// counter to cycle back to a value still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u16);

impl TransactionId {
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<TransactionId> {
        if bytes.len() != 2 {
            return None;
        }
        Some(TransactionId(u16::from_be_bytes([bytes[0], bytes[1]])))
    }
}

/// Hands out fresh, monotonically increasing transaction IDs.
pub struct TransactionIdGenerator {
    next: AtomicU16,
}

impl TransactionIdGenerator {
    pub fn new() -> TransactionIdGenerator {
        TransactionIdGenerator { next: AtomicU16::new(0) }
    }

    pub fn next(&self) -> TransactionId {
        TransactionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TransactionIdGenerator {
    fn default() -> TransactionIdGenerator {
        TransactionIdGenerator::new()
    }
}
