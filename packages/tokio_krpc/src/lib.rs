//! Single-socket UDP transport for the DHT crawler.

mod error;
mod transport;

pub use error::{Result, TransportError};
pub use transport::{Inbound, Transport, UdpTransport, UDP_READ_RETRIES, UDP_READ_TIMEOUT};
