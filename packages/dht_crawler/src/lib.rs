//! Kademlia-style DHT node for tracker-less BitTorrent peer discovery.
//!
//! Given an info-hash, [`Engine`] iteratively queries remote DHT peers
//! over UDP (BEP-0005 KRPC), maintains a flat routing table of remote
//! nodes it has heard of, and streams back discovered peer contacts. It
//! does not answer inbound queries, maintain k-buckets, persist its
//! routing table, emit `announce_peer`, or send `find_node` refresh
//! traffic.

pub mod config;
pub mod constants;
mod engine;
mod error;
mod infohash_peers;

pub use config::EngineConfig;
pub use engine::{Acquaintance, Engine, PeerDelta};
pub use error::DhtError;

pub use krpc_protocol::{Addr, Id20, InfoHash, NodeId};

#[cfg(test)]
mod tests;
