use krpc_protocol::{InfoHash, NodeId, TransactionId};
use rand::Rng;
use std::collections::HashMap;
use tracing::warn;

/// Past this many outstanding queries to one remote, the engine treats it
/// as stale and skips it when selecting `GetPeers` targets. There is no
/// active eviction -- pending queries only ever leave via a matching
/// response (or never, which is a known leak).
pub const MAX_NODE_PENDING_QUERIES: usize = 5;

/// The kind of an outstanding query, as recorded against its transaction
/// id so a later response can be routed without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Ping,
    GetPeers,
}

/// Per-outstanding-query bookkeeping, keyed by `TransactionId` inside a
/// `RemoteNode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub kind: QueryKind,
    pub info_hash: Option<InfoHash>,
}

/// Everything the engine knows about one remote DHT node.
///
/// `address` never changes after construction. `id` starts empty and is
/// learned (and then frozen) from the first valid response; a later
/// response disagreeing with an already-learned id is a logged anomaly,
/// never acted on. `reachable` only ever flips from false to true.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    address: krpc_protocol::Addr,
    id: Option<NodeId>,
    reachable: bool,
    pending_queries: HashMap<TransactionId, PendingQuery>,
    next_tid: u8,
}

impl RemoteNode {
    /// Creates a fresh, unreachable, id-less node. The transaction counter
    /// is seeded from a random starting value so distinct nodes
    /// don't all hand out `tid = 0` on their first query.
    pub fn new(address: krpc_protocol::Addr) -> RemoteNode {
        RemoteNode {
            address,
            id: None,
            reachable: false,
            pending_queries: HashMap::new(),
            next_tid: rand::thread_rng().gen(),
        }
    }

    pub fn address(&self) -> krpc_protocol::Addr {
        self.address
    }

    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn reachable(&self) -> bool {
        self.reachable
    }

    pub fn mark_reachable(&mut self) {
        self.reachable = true;
    }

    /// Learns this node's id from a valid response. A later response
    /// disagreeing with an already-learned id is logged and ignored --
    /// the first id wins for the lifetime of the process.
    pub fn learn_id(&mut self, id: NodeId) {
        match self.id {
            None => self.id = Some(id),
            Some(existing) if existing != id => {
                warn!(
                    address = %self.address,
                    existing = %existing,
                    reported = %id,
                    "remote node id mismatch, keeping first-learned id"
                );
            }
            Some(_) => {}
        }
    }

    pub fn pending_query_count(&self) -> usize {
        self.pending_queries.len()
    }

    /// Whether this node should be skipped as a `GetPeers` candidate
    /// because it already has too many outstanding queries.
    pub fn is_stale(&self) -> bool {
        self.pending_query_count() > MAX_NODE_PENDING_QUERIES
    }

    pub fn has_pending_get_peers(&self, info_hash: InfoHash) -> bool {
        self.pending_queries
            .values()
            .any(|pq| pq.kind == QueryKind::GetPeers && pq.info_hash == Some(info_hash))
    }

    /// Allocates a fresh transaction id (incrementing mod 256) and records
    /// a pending-query stub for it.
    fn allocate(&mut self, kind: QueryKind, info_hash: Option<InfoHash>) -> TransactionId {
        let tid = TransactionId::from_u8(self.next_tid);
        self.next_tid = self.next_tid.wrapping_add(1);
        self.pending_queries.insert(tid.clone(), PendingQuery { kind, info_hash });
        tid
    }

    pub fn new_ping_query(&mut self) -> TransactionId {
        self.allocate(QueryKind::Ping, None)
    }

    pub fn new_get_peers_query(&mut self, info_hash: InfoHash) -> TransactionId {
        self.allocate(QueryKind::GetPeers, Some(info_hash))
    }

    /// Looks up and removes the pending query for `tid`, if any. Returns
    /// `None` for an unknown transaction id (already resolved, or never
    /// ours -- both are logged by the caller, not here).
    pub fn resolve_response(&mut self, tid: &TransactionId) -> Option<PendingQuery> {
        self.pending_queries.remove(tid)
    }
}
