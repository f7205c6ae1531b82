use crate::error::{Result, TransportError};
use krpc_protocol::Addr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{instrument, trace, warn};

/// Per read-attempt timeout before the read task checks in and retries.
pub const UDP_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Consecutive timeouts logged as a group before going quiet again, so an
/// idle socket doesn't spam the log once a second forever.
pub const UDP_READ_RETRIES: u32 = 3;

const MAX_DATAGRAM_SIZE: usize = 65_507;

/// One inbound datagram, as delivered to the engine's event loop.
pub type Inbound = (SocketAddr, Vec<u8>);

/// A trait over "can send a KRPC datagram and produces an inbound event
/// stream", so the DHT engine can be driven by either a real
/// [`UdpTransport`] or an in-memory mock in tests.
pub trait Transport: Send + Sync {
    /// Fire-and-forget send; transport errors are logged, never returned.
    fn send(&self, addr: SocketAddr, bytes: Vec<u8>);
}

/// A single UDP socket shared between outbound sends and one dedicated
/// background read task. No per-peer sockets, no reassembly -- UDP is
/// already message-oriented, and an oversized or truncated datagram just
/// fails bencode decode downstream.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Binds a UDP socket on `port` (0 picks an OS-assigned port), spawns
    /// its read task, and returns the transport handle plus the channel
    /// the engine should drain for inbound datagrams.
    #[instrument(skip_all, fields(port))]
    pub async fn bind(port: u16) -> Result<(UdpTransport, mpsc::Receiver<Inbound>)> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| TransportError::Bind { port, source })?;
        let socket = Arc::new(socket);
        let (tx, rx) = mpsc::channel(256);

        let reader_socket = socket.clone();
        tokio::spawn(async move { read_loop(reader_socket, tx).await });

        Ok((UdpTransport { socket }, rx))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn send(&self, addr: SocketAddr, bytes: Vec<u8>) {
        let socket = self.socket.clone();
        tokio::spawn(async move {
            if let Err(source) = socket.send_to(&bytes, addr).await {
                warn!(error = %TransportError::Send { addr, source }, "udp send failed");
            }
        });
    }
}

/// Also accepts a `krpc_protocol::Addr` directly for callers that don't
/// want to convert to `SocketAddr` themselves.
impl UdpTransport {
    pub fn send_to(&self, addr: Addr, bytes: Vec<u8>) {
        self.send(addr.socket_addr().into(), bytes);
    }
}

async fn read_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Inbound>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut consecutive_timeouts = 0u32;

    loop {
        match timeout(UDP_READ_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                consecutive_timeouts = 0;
                if tx.send((from, buf[..len].to_vec())).await.is_err() {
                    trace!("inbound channel closed, stopping udp read loop");
                    return;
                }
            }
            Ok(Err(source)) => {
                warn!(error = %TransportError::Recv { source }, "udp recv failed");
            }
            Err(_elapsed) => {
                consecutive_timeouts += 1;
                if consecutive_timeouts >= UDP_READ_RETRIES {
                    trace!(consecutive_timeouts, "no datagrams recently");
                    consecutive_timeouts = 0;
                }
            }
        }
    }
}
