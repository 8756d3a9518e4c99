use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode KRPC message")]
    DecodeError {
        #[source]
        cause: serde_bencode::Error,
    },

    #[error("failed to encode KRPC message")]
    EncodeError {
        #[source]
        cause: serde_bencode::Error,
    },

    #[error("compact node/peer info of length {len} is not a multiple of {unit}")]
    BadCompactLength { len: usize, unit: usize },

    #[error("KRPC message did not carry the shape expected for a {expected} response")]
    ProtocolViolation { expected: &'static str },
}
