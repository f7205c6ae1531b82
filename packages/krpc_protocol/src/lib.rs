//! KRPC message shapes and wire codec (BEP-0005) for the DHT crawler.
//!
//! This crate owns the parts of the protocol component D `dht_crawler`
//! depends on but doesn't itself need to know the bencode details of:
//! node/info-hash identities, the XOR distance metric, compact contact
//! parsing, and the query/response envelope.

mod addr;
mod error;
mod messages;
mod node_id;
mod node_info;
mod transaction;

pub use addr::{Addr, PEER_CONTACT_LEN};
pub use error::{KrpcError, Result};
pub use messages::{decode, encode_get_peers, encode_ping, KrpcErrorPayload, Message, Query, Response};
pub use node_id::{hash_distance, Id20, InfoHash, NodeId, ID_LEN};
pub use node_info::{encode_compact_nodes, parse_compact_nodes, NodeInfo, NODE_CONTACT_LEN};
pub use transaction::TransactionId;
