use crate::error::{KrpcError, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// Length in bytes of a compact peer contact (4-byte IPv4 + 2-byte port).
pub const PEER_CONTACT_LEN: usize = 6;

/// An IPv4 `ip:port` pair -- the primary key of the routing table and the
/// shape peer contacts take once decoded off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(SocketAddrV4);

impl Addr {
    pub fn new(ip: Ipv4Addr, port: u16) -> Addr {
        Addr(SocketAddrV4::new(ip, port))
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        self.0
    }

    /// Parses the 6-byte compact peer contact form: 4-byte IPv4 address
    /// followed by a 2-byte big-endian port.
    pub fn from_compact(bytes: &[u8]) -> Result<Addr> {
        if bytes.len() != PEER_CONTACT_LEN {
            return Err(KrpcError::InvalidContact(format!(
                "compact peer contact must be {} bytes, got {}",
                PEER_CONTACT_LEN,
                bytes.len()
            )));
        }
        Ok(binary_to_addr(bytes))
    }

    /// Encodes this address to its 6-byte compact peer contact form.
    pub fn to_compact(&self) -> [u8; PEER_CONTACT_LEN] {
        let mut out = [0u8; PEER_CONTACT_LEN];
        out[..4].copy_from_slice(&self.0.ip().octets());
        out[4..].copy_from_slice(&self.0.port().to_be_bytes());
        out
    }
}

/// Decodes a 6-byte compact contact
/// into `"b0.b1.b2.b3:P"`.
fn binary_to_addr(bytes: &[u8]) -> Addr {
    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = u16::from_be_bytes([bytes[4], bytes[5]]);
    Addr::new(ip, port)
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.ip(), self.0.port())
    }
}

impl FromStr for Addr {
    type Err = KrpcError;

    fn from_str(s: &str) -> Result<Addr> {
        let socket: SocketAddrV4 = s
            .parse()
            .map_err(|_| KrpcError::InvalidContact(format!("not an ip:port pair: {}", s)))?;
        Ok(Addr(socket))
    }
}

impl From<SocketAddrV4> for Addr {
    fn from(addr: SocketAddrV4) -> Addr {
        Addr(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_to_dotted_port_matches_canonical_vector() {
        let addr = Addr::from_compact(&[0x7f, 0x00, 0x00, 0x01, 0x1a, 0xe1]).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:6881");
    }

    #[test]
    fn compact_round_trips() {
        let addr: Addr = "10.0.0.2:200".parse().unwrap();
        let compact = addr.to_compact();
        assert_eq!(Addr::from_compact(&compact).unwrap(), addr);
    }

    #[test]
    fn rejects_wrong_length_compact_contact() {
        assert!(Addr::from_compact(&[1, 2, 3]).is_err());
        assert!(Addr::from_compact(&[0u8; 7]).is_err());
    }
}
