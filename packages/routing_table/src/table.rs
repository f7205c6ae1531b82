use crate::remote_node::RemoteNode;
use krpc_protocol::Addr;
use std::collections::HashMap;

/// The local node's knowledge of remote DHT nodes, keyed by address.
///
/// Keyed by address rather than by `NodeId`, since a node's id isn't
/// known until its first response arrives but its address is known
/// immediately. Kademlia k-buckets would be a reasonable enhancement on
/// top of this; this is the flat minimum.
#[derive(Debug, Default)]
pub struct RoutingTable {
    nodes: HashMap<Addr, RemoteNode>,
}

impl RoutingTable {
    pub fn new() -> RoutingTable {
        RoutingTable { nodes: HashMap::new() }
    }

    pub fn get(&self, address: Addr) -> Option<&RemoteNode> {
        self.nodes.get(&address)
    }

    pub fn get_mut(&mut self, address: Addr) -> Option<&mut RemoteNode> {
        self.nodes.get_mut(&address)
    }

    pub fn contains(&self, address: Addr) -> bool {
        self.nodes.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a brand-new node at `address` if one isn't already present,
    /// and returns a mutable reference to whichever node now lives there.
    ///
    /// Idempotent by construction: a duplicate acquaintance (e.g. two
    /// concurrent bootstrap introductions racing at startup) never creates
    /// a second entry for the same address.
    pub fn get_or_insert(&mut self, address: Addr) -> &mut RemoteNode {
        self.nodes.entry(address).or_insert_with(|| RemoteNode::new(address))
    }

    pub fn values(&self) -> impl Iterator<Item = &RemoteNode> {
        self.nodes.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut RemoteNode> {
        self.nodes.values_mut()
    }
}
