//! Typed KRPC (BEP-5) message envelope and the compact wire encodings it
//! relies on. Decoding/encoding goes through `serde_bencode`; the untyped
//! value inspection used elsewhere in the crawler (e.g. extracting an
//! `info` dict from a metadata transfer) lives in the separate `bencode`
//! crate, not here.

mod addr;
mod booleans;
mod errors;
mod messages;
mod node_id;
mod node_info;

pub use addr::Addr;
pub use errors::{Error, Result};
pub use messages::{Envelope, KRPCError, MessageType, Query, Response};
pub use node_id::NodeID;
pub use node_info::NodeInfo;
