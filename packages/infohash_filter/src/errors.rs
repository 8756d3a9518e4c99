use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("memcache protocol error: {0}")]
    CacheProtocol(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}
