use crate::error::{KrpcError, Result};
use std::fmt;

pub const ID_LEN: usize = 20;

/// An opaque 20-byte identifier.
///
/// Used both as a remote node's `NodeID` and as a torrent's `InfoHash` --
/// the two are the same shape on the wire and only differ by role, so this
/// crate models them with one type and two aliases.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id20([u8; ID_LEN]);

/// Remote or local DHT node identity.
pub type NodeId = Id20;
/// Torrent info-hash, the DHT lookup key.
pub type InfoHash = Id20;

impl Id20 {
    pub const ZERO: Id20 = Id20([0u8; ID_LEN]);

    pub fn new(bytes: [u8; ID_LEN]) -> Id20 {
        Id20(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Id20> {
        let array: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| KrpcError::IdLengthMismatch(bytes.len()))?;
        Ok(Id20(array))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Bytewise XOR distance between two distinct 20-byte identifiers,
/// compared lexicographically as a 160-bit big-endian integer.
///
/// Identical ids are a programming error in this protocol (a node should
/// never be asked its distance from itself) and are rejected rather than
/// silently returning the zero distance.
pub fn hash_distance(a: Id20, b: Id20) -> Result<Id20> {
    if a == b {
        return Err(KrpcError::UnexpectedMessage(
            "hash_distance called on identical ids".to_string(),
        ));
    }
    let mut out = [0u8; ID_LEN];
    for i in 0..ID_LEN {
        out[i] = a.0[i] ^ b.0[i];
    }
    Ok(Id20(out))
}

impl fmt::Debug for Id20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Id20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
