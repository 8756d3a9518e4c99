use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("peer-wire I/O error")]
    IOError(#[from] std::io::Error),

    #[error("peer echoed a different infohash during the BT handshake")]
    HandshakeMismatch,

    #[error("peer does not support the BEP-10 extension protocol")]
    NoExtensionSupport,

    #[error("peer did not advertise ut_metadata support")]
    NoMetadataExtension,

    #[error("peer advertised metadata_size {size} outside the acceptable range")]
    BadMetadataSize { size: i64 },

    #[error("message of {len} bytes exceeds the {limit} byte ceiling")]
    OversizedMessage { len: usize, limit: usize },

    #[error("peer rejected a metadata piece request")]
    PeerReject,

    #[error("assembled metadata failed SHA-1 verification against the infohash")]
    ChecksumMismatch,

    #[error("session exceeded its {0:?} budget")]
    Timeout(std::time::Duration),

    #[error("failed to decode a bencoded peer-wire payload")]
    BencodeError(#[from] serde_bencode::Error),
}
