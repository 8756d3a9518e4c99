use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("unique constraint violated, batch dropped")]
    UniqueViolation,

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
