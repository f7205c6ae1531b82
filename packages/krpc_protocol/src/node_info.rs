use crate::addr::{Addr, PEER_CONTACT_LEN};
use crate::error::{KrpcError, Result};
use crate::node_id::{Id20, NodeId, ID_LEN};
use tracing::instrument;

/// Length in bytes of a compact node contact: 20-byte `NodeID` followed by
/// a 6-byte compact peer contact.
pub const NODE_CONTACT_LEN: usize = ID_LEN + PEER_CONTACT_LEN;

/// A remote node's id paired with its address, as carried in a `get_peers`
/// response's `nodes` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub addr: Addr,
}

/// Parses the concatenated compact `nodes` field.
///
/// A length that isn't a multiple of 26 is reported as `InvalidContact`;
/// this is not fatal to the containing response -- the
/// caller logs it and discards the whole field, continuing to process the
/// rest of the message.
#[instrument(skip(bytes), level = "trace")]
pub fn parse_compact_nodes(bytes: &[u8]) -> Result<Vec<NodeInfo>> {
    if bytes.len() % NODE_CONTACT_LEN != 0 {
        return Err(KrpcError::InvalidContact(format!(
            "compact nodes field length {} is not a multiple of {}",
            bytes.len(),
            NODE_CONTACT_LEN
        )));
    }
    bytes
        .chunks_exact(NODE_CONTACT_LEN)
        .map(|record| {
            let id = Id20::from_slice(&record[..20])?;
            let addr = Addr::from_compact(&record[20..])?;
            Ok(NodeInfo { id, addr })
        })
        .collect()
}

pub fn encode_compact_nodes(nodes: &[NodeInfo]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * NODE_CONTACT_LEN);
    for node in nodes {
        out.extend_from_slice(node.id.as_bytes());
        out.extend_from_slice(&node.addr.to_compact());
    }
    out
}
