//! Routing table and per-remote query bookkeeping for the DHT crawler.
//!
//! Owns the `RemoteNode` record and the flat,
//! address-keyed `RoutingTable` it lives in.

mod remote_node;
mod table;

pub use remote_node::{PendingQuery, QueryKind, RemoteNode, MAX_NODE_PENDING_QUERIES};
pub use table::RoutingTable;
