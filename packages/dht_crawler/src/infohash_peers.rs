use crate::constants::MAX_INFOHASH_PEERS;
use krpc_protocol::{Addr, InfoHash};
use std::collections::{HashMap, HashSet};

/// Accumulates every distinct peer contact ever returned for each
/// info-hash. Never shrinks, never duplicates.
#[derive(Debug, Default)]
pub struct InfoHashPeers {
    peers: HashMap<InfoHash, HashSet<Addr>>,
}

impl InfoHashPeers {
    pub fn new() -> InfoHashPeers {
        InfoHashPeers { peers: HashMap::new() }
    }

    pub fn len_for(&self, info_hash: InfoHash) -> usize {
        self.peers.get(&info_hash).map_or(0, HashSet::len)
    }

    /// Whether recursion should stop for this info-hash. Note this only
    /// gates *starting new* `GetPeers` fan-out -- a response that was
    /// already in flight when the cap was reached still has its contacts
    /// ingested -- in-flight responses are still ingested even past the
    /// cap, so `insert_new` itself is never capped.
    pub fn at_cap(&self, info_hash: InfoHash) -> bool {
        self.len_for(info_hash) >= MAX_INFOHASH_PEERS
    }

    /// Adds every contact in `candidates` not already recorded for
    /// `info_hash`, returning just the newly-added ones (the "delta").
    pub fn insert_new(
        &mut self,
        info_hash: InfoHash,
        candidates: impl IntoIterator<Item = Addr>,
    ) -> Vec<Addr> {
        let set = self.peers.entry(info_hash).or_default();
        candidates
            .into_iter()
            .filter(|addr| set.insert(*addr))
            .collect()
    }
}
