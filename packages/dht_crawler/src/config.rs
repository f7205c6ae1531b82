use crate::constants::DEFAULT_BOOTSTRAP_ADDR;
use krpc_protocol::Addr;

/// Tunables for one [`crate::Engine`]. There is no on-disk or env-var
/// config surface in the core -- everything here is a plain constructor
/// argument rather than something parsed from a file or environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Router queried once at startup to seed the routing table.
    pub bootstrap_addr: Addr,
    /// Capacity of the client -> engine acquaintance channel.
    pub introduce_channel_capacity: usize,
    /// Capacity of the client -> engine peers-request channel. Kept
    /// private and never zero: `mpsc::channel(0)` panics, and the default
    /// of 1 is what avoids deadlock when the engine is emitting results
    /// while the client is submitting requests. Set it through
    /// [`EngineConfig::with_peers_request_channel_capacity`].
    peers_request_channel_capacity: usize,
    /// Capacity of the engine -> client results channel.
    pub results_channel_capacity: usize,
}

impl EngineConfig {
    pub fn peers_request_channel_capacity(&self) -> usize {
        self.peers_request_channel_capacity
    }

    /// Overrides the peers-request channel capacity. Panics on 0, which
    /// `tokio::sync::mpsc::channel` would otherwise panic on anyway, just
    /// later and less clearly.
    pub fn with_peers_request_channel_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "peers_request_channel_capacity must be at least 1");
        self.peers_request_channel_capacity = capacity;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bootstrap_addr: DEFAULT_BOOTSTRAP_ADDR
                .parse()
                .expect("DEFAULT_BOOTSTRAP_ADDR is a valid ip:port literal"),
            introduce_channel_capacity: 32,
            peers_request_channel_capacity: 1,
            results_channel_capacity: 32,
        }
    }
}
