//! Authoritative tuning constants.

/// How many of the closest candidates `GetPeers` queries per fan-out round.
pub const NUM_INCREMENTAL_NODE_QUERIES: usize = 5;

/// Per-info-hash cap on accumulated distinct peer contacts. Once reached,
/// no further recursion is initiated for that info-hash (in-flight
/// responses already under way are still ingested).
pub const MAX_INFOHASH_PEERS: usize = 20;

/// Default bootstrap router, used when the caller doesn't override it.
pub const DEFAULT_BOOTSTRAP_ADDR: &str = "67.215.242.138:6881";

pub use routing_table::MAX_NODE_PENDING_QUERIES;
pub use tokio_krpc::{UDP_READ_RETRIES, UDP_READ_TIMEOUT};
