use thiserror::Error;

/// Failures the KRPC message layer can report. None of these tear down the
/// engine -- callers log and drop on every variant (see the DHT engine's
/// dispatch logic).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KrpcError {
    #[error("malformed bencode on the wire: {0}")]
    MalformedBencode(#[from] bencode::BencodeError),

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("invalid compact contact: {0}")]
    InvalidContact(String),

    #[error("id is not exactly 20 bytes (got {0})")]
    IdLengthMismatch(usize),
}

pub type Result<T> = std::result::Result<T, KrpcError>;
