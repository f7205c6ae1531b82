use thiserror::Error;

/// Transport-level failures. All are soft -- logged by the caller, never
/// fatal to the engine. The one exception is a
/// bind failure, which is an initialization error surfaced to whoever
/// calls `UdpTransport::bind`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket on port {port}: {source}")]
    Bind { port: u16, #[source] source: std::io::Error },

    #[error("udp send to {addr} failed: {source}")]
    Send { addr: std::net::SocketAddr, #[source] source: std::io::Error },

    #[error("udp recv failed: {source}")]
    Recv { #[source] source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, TransportError>;
