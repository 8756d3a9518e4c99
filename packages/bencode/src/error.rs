use thiserror::Error;

/// Decode failures, each tagged with the byte offset at which they occurred
/// so callers can log exactly where in a hostile blob things went wrong.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("expected a digit at offset {offset}, found byte {found:#04x}")]
    InvalidLength { offset: usize, found: u8 },

    #[error("integer at offset {offset} has a disallowed leading zero")]
    LeadingZero { offset: usize },

    #[error("integer at offset {offset} is negative zero (`i-0e`), which is not allowed")]
    NegativeZero { offset: usize },

    #[error("expected byte {expected:#04x} at offset {offset}, found {found:#04x}")]
    UnexpectedByte {
        offset: usize,
        expected: u8,
        found: u8,
    },

    #[error("dictionary at offset {offset} has duplicate key {key:?}")]
    DuplicateKey { offset: usize, key: Vec<u8> },

    #[error("trailing bytes after a complete value at offset {offset}")]
    TrailingBytes { offset: usize },
}
