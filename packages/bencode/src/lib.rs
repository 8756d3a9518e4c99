//! A small, dependency-free codec for the bencode grammar: byte-strings,
//! signed integers, lists and dictionaries.
//!
//! This exists alongside `krpc_protocol`'s `serde`-based encoding because the
//! crawler also has to make sense of bencoded blobs whose *shape* it does not
//! control — the `info` dictionary a remote peer hands over via ut_metadata.
//! There `serde_bencode`'s static structs don't help: we need a dynamically
//! typed value and typed accessors that fail loudly on a shape mismatch
//! rather than panicking.

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_prefix};
pub use encode::encode;
pub use error::Error;
pub use value::BValue;

pub type Result<T> = std::result::Result<T, Error>;
