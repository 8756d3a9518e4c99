//! A single peer session: BEP-3 handshake, BEP-10 extension handshake,
//! BEP-9 ut_metadata piece fetch, SHA-1 verification against the
//! requested infohash. One call to `fetch_metadata` is the whole
//! lifecycle of one TCP connection to one peer for one infohash.

mod errors;
mod extension;
mod handshake;
mod metadata;
mod session;

pub use errors::{Error, Result};
pub use extension::ExtensionHandshake;
pub use handshake::Handshake;
pub use session::{fetch_metadata, CONNECT_TIMEOUT, PEER_TIMEOUT, PIECE_SIZE, READ_STALL_TIMEOUT};
