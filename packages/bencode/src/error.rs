use thiserror::Error;

/// Failure modes of the bencode codec.
///
/// Every variant is recoverable by construction: nothing in this crate ever
/// panics on malformed input, it returns one of these instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid string length prefix")]
    InvalidStringLength,

    #[error("invalid integer literal")]
    InvalidInteger,

    #[error("malformed bencode: {0}")]
    Malformed(String),

    #[error("{0} trailing byte(s) after a complete value")]
    TrailingData(usize),
}

pub type Result<T> = std::result::Result<T, BencodeError>;
