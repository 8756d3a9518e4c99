//! Persistence façade (C8): buffers decoded torrent metadata in memory
//! and flushes it to a relational store in batched, atomic commits.
//! Backs `infohash_filter`'s `DurableStore` so the rest of the crawler
//! never has to know which SQL backend is in use.

mod database;
mod errors;
mod metadata;
mod schema;
mod stats;

pub use database::Database;
pub use errors::{Error, Result};
pub use metadata::{decode_info, DecodedMetadata, FileEntry};
pub use stats::Snapshot;
