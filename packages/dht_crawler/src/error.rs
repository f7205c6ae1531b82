use thiserror::Error;

/// Only initialization errors are ever surfaced to a caller;
/// every other failure mode is soft and handled by logging inside the
/// event loop.
#[derive(Debug, Error)]
pub enum DhtError {
    #[error(transparent)]
    Transport(#[from] tokio_krpc::TransportError),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
}
