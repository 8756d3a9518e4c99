use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport I/O error")]
    IOError(#[from] std::io::Error),

    #[error("no response received for transaction before its deadline")]
    Timeout,

    #[error("remote node rejected the query: {0}")]
    Rejected(krpc_protocol::KRPCError),

    #[error(transparent)]
    Protocol(#[from] krpc_protocol::Error),
}
