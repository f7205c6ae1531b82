use crate::config::EngineConfig;
use crate::constants::NUM_INCREMENTAL_NODE_QUERIES;
use crate::error::DhtError;
use crate::infohash_peers::InfoHashPeers;
use krpc_protocol::{hash_distance, Addr, Id20, InfoHash, Message, NodeId, Response};
use routing_table::{QueryKind, RoutingTable};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_krpc::{Inbound, Transport, UdpTransport};
use tracing::{debug, instrument, warn};

/// "Torrent heard about a new node" -- acquaintance submitted by the
/// client. `id` is an optional hint; a remote's id is only ever trusted
/// once learned from that remote's own response, so this hint is logged
/// but not acted on.
#[derive(Debug, Clone)]
pub struct Acquaintance {
    pub address: Addr,
    pub id: Option<NodeId>,
}

/// One batch of newly-discovered peer contacts for an info-hash. Never
/// emitted with an empty `peers` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDelta {
    pub info_hash: InfoHash,
    pub peers: Vec<Addr>,
}

/// The public handle the surrounding torrent engine talks to.
///
/// Constructed with [`Engine::new`], then [`Engine::start`] spawns the
/// single-threaded event loop and the UDP reader and performs bootstrap.
/// `introduce`/`request_peers` submit work; the `mpsc::Receiver<PeerDelta>`
/// returned by `start` is the observable stream of discovered peers.
pub struct Engine {
    local_id: NodeId,
    port: u16,
    config: EngineConfig,
    introduce_tx: mpsc::Sender<Acquaintance>,
    introduce_rx: Option<mpsc::Receiver<Acquaintance>>,
    peers_request_tx: mpsc::Sender<InfoHash>,
    peers_request_rx: Option<mpsc::Receiver<InfoHash>>,
}

impl Engine {
    pub fn new(local_id: NodeId, port: u16) -> Engine {
        Engine::with_config(local_id, port, EngineConfig::default())
    }

    pub fn with_config(local_id: NodeId, port: u16, config: EngineConfig) -> Engine {
        let (introduce_tx, introduce_rx) = mpsc::channel(config.introduce_channel_capacity);
        let (peers_request_tx, peers_request_rx) =
            mpsc::channel(config.peers_request_channel_capacity());
        Engine {
            local_id,
            port,
            config,
            introduce_tx,
            introduce_rx: Some(introduce_rx),
            peers_request_tx,
            peers_request_rx: Some(peers_request_rx),
        }
    }

    /// Binds the UDP socket, spawns the event loop and its read task, and
    /// issues the bootstrap ping. Returns the results stream; binding
    /// failure is the only error this surfaces.
    #[instrument(skip(self), fields(port = self.port))]
    pub async fn start(&mut self) -> Result<mpsc::Receiver<PeerDelta>, DhtError> {
        let (transport, inbound_rx) = UdpTransport::bind(self.port).await?;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.start_with_transport(transport, inbound_rx).await
    }

    /// Same as [`Engine::start`] but with an injected transport, so tests
    /// can drive the event loop against an in-memory mock instead of a
    /// real socket.
    pub async fn start_with_transport(
        &mut self,
        transport: Arc<dyn Transport>,
        inbound_rx: mpsc::Receiver<Inbound>,
    ) -> Result<mpsc::Receiver<PeerDelta>, DhtError> {
        let introduce_rx = self
            .introduce_rx
            .take()
            .ok_or(DhtError::ChannelClosed("introduce"))?;
        let peers_request_rx = self
            .peers_request_rx
            .take()
            .ok_or(DhtError::ChannelClosed("peers_request"))?;
        let (results_tx, results_rx) = mpsc::channel(self.config.results_channel_capacity);

        let local_id = self.local_id;
        tokio::spawn(run_event_loop(
            local_id,
            transport,
            introduce_rx,
            peers_request_rx,
            inbound_rx,
            results_tx,
        ));

        self.bootstrap().await;
        Ok(results_rx)
    }

    /// Issues the bootstrap acquaintance. A failure here (the channel
    /// already closed) is logged, never returned -- a degraded-
    /// connectivity start is still a valid start.
    async fn bootstrap(&self) {
        let bootstrap = Acquaintance {
            address: self.config.bootstrap_addr,
            id: None,
        };
        if let Err(e) = self.introduce_tx.send(bootstrap).await {
            warn!(error = %e, "bootstrap introduction failed, continuing with an empty routing table");
        }
    }

    /// Submits an acquaintance: the torrent engine heard about a new node.
    pub async fn introduce(&self, address: Addr, id: Option<NodeId>) -> Result<(), DhtError> {
        self.introduce_tx
            .send(Acquaintance { address, id })
            .await
            .map_err(|_| DhtError::ChannelClosed("introduce"))
    }

    /// Requests peers for `info_hash`. Resolved contacts stream back on
    /// the receiver returned by `start`.
    pub async fn request_peers(&self, info_hash: InfoHash) -> Result<(), DhtError> {
        self.peers_request_tx
            .send(info_hash)
            .await
            .map_err(|_| DhtError::ChannelClosed("peers_request"))
    }
}

/// The single-threaded cooperative loop: all routing-table
/// mutations, `InfoHashPeers` updates, and pending-query bookkeeping
/// happen here and nowhere else. Ends when every sender (the `Engine` and
/// the transport's read task) has been dropped.
async fn run_event_loop(
    local_id: NodeId,
    transport: Arc<dyn Transport>,
    mut introduce_rx: mpsc::Receiver<Acquaintance>,
    mut peers_request_rx: mpsc::Receiver<InfoHash>,
    mut inbound_rx: mpsc::Receiver<Inbound>,
    results_tx: mpsc::Sender<PeerDelta>,
) {
    let mut table = RoutingTable::new();
    let mut peers = InfoHashPeers::new();

    loop {
        tokio::select! {
            acq = introduce_rx.recv() => match acq {
                Some(acq) => handle_acquaintance(&mut table, transport.as_ref(), local_id, acq),
                None => break,
            },
            info_hash = peers_request_rx.recv() => match info_hash {
                Some(info_hash) => get_peers(&mut table, transport.as_ref(), local_id, &peers, info_hash),
                None => break,
            },
            inbound = inbound_rx.recv() => match inbound {
                Some((from, bytes)) => handle_inbound(
                    &mut table,
                    &mut peers,
                    transport.as_ref(),
                    local_id,
                    from,
                    bytes,
                    &results_tx,
                ),
                None => break,
            },
        }
    }
}

pub(crate) fn handle_acquaintance(
    table: &mut RoutingTable,
    transport: &dyn Transport,
    local_id: NodeId,
    acquaintance: Acquaintance,
) {
    if table.contains(acquaintance.address) {
        debug!(address = %acquaintance.address, "acquaintance with an already-known node, ignored");
        return;
    }
    if let Some(hint) = acquaintance.id {
        debug!(address = %acquaintance.address, id = %hint, "acquaintance carried an id hint, not trusted until this node responds");
    }
    let node = table.get_or_insert(acquaintance.address);
    let tid = node.new_ping_query();
    let bytes = krpc_protocol::encode_ping(local_id, &tid);
    transport.send(acquaintance.address.socket_addr().into(), bytes);
    debug!(address = %acquaintance.address, "introduced new node, ping sent");
}

/// The `GetPeers` procedure: build the candidate list, sort by
/// XOR distance to `info_hash`, query the closest
/// `NUM_INCREMENTAL_NODE_QUERIES`.
pub(crate) fn get_peers(
    table: &mut RoutingTable,
    transport: &dyn Transport,
    local_id: NodeId,
    peers: &InfoHashPeers,
    info_hash: InfoHash,
) {
    if peers.at_cap(info_hash) {
        debug!(info_hash = %info_hash, "info-hash already at peer cap, not planning new queries");
        return;
    }

    let mut candidates: Vec<Addr> = table
        .values()
        .filter(|node| !node.is_stale() && !node.has_pending_get_peers(info_hash))
        .map(|node| node.address())
        .collect();
    candidates.sort_by_key(|addr| {
        let node = table.get(*addr).expect("candidate came from this table");
        distance_sort_key(node.id(), info_hash)
    });

    for addr in candidates.into_iter().take(NUM_INCREMENTAL_NODE_QUERIES) {
        let node = table.get_or_insert(addr);
        let tid = node.new_get_peers_query(info_hash);
        let bytes = krpc_protocol::encode_get_peers(local_id, info_hash, &tid);
        transport.send(addr.socket_addr().into(), bytes);
    }
}

/// Nodes with an unlearned id sort as if their id were all-zeros -- a
/// known rough edge, inherited rather than silently corrected.
fn distance_sort_key(id: Option<NodeId>, info_hash: InfoHash) -> Id20 {
    let effective = id.unwrap_or(Id20::ZERO);
    hash_distance(effective, info_hash).unwrap_or(Id20::ZERO)
}

pub(crate) fn handle_inbound(
    table: &mut RoutingTable,
    peers: &mut InfoHashPeers,
    transport: &dyn Transport,
    local_id: NodeId,
    from: SocketAddr,
    bytes: Vec<u8>,
    results_tx: &mpsc::Sender<PeerDelta>,
) {
    let message = match krpc_protocol::decode(&bytes) {
        Ok(message) => message,
        Err(e) => {
            warn!(%from, error = %e, "malformed bencode, dropping datagram");
            return;
        }
    };

    let addr = match from {
        SocketAddr::V4(v4) => Addr::from(v4),
        SocketAddr::V6(_) => {
            warn!(%from, "IPv6 sender out of scope, dropping datagram");
            return;
        }
    };

    if !table.contains(addr) {
        debug!(%addr, "datagram from an unknown sender, dropping");
        return;
    }

    match message {
        Message::Response { tid, response } => {
            let pending = {
                let node = table.get_mut(addr).expect("checked contains above");
                node.learn_id(response.id);
                match node.resolve_response(&tid) {
                    Some(pending) => {
                        node.mark_reachable();
                        pending
                    }
                    None => {
                        warn!(%addr, %tid, "response to an unknown transaction id, dropping");
                        return;
                    }
                }
            };
            match pending.kind {
                QueryKind::Ping => {
                    debug!(%addr, "ping resolved, node now reachable");
                }
                QueryKind::GetPeers => {
                    let info_hash = pending
                        .info_hash
                        .expect("a get_peers pending query always carries an info_hash");
                    process_get_peer_results(
                        table, peers, transport, local_id, response, info_hash, results_tx,
                    );
                }
            }
        }
        Message::Query { tid, query } => {
            debug!(%addr, %tid, ?query, "inbound query, not answering (out of scope)");
        }
        Message::Error { tid, error } => {
            warn!(%addr, %tid, code = error.0, message = %error.1, "remote returned a KRPC error");
        }
    }
}

/// `processGetPeerResults`. Both branches below may fire for
/// the same response.
pub(crate) fn process_get_peer_results(
    table: &mut RoutingTable,
    peers: &mut InfoHashPeers,
    transport: &dyn Transport,
    local_id: NodeId,
    response: Response,
    info_hash: InfoHash,
    results_tx: &mpsc::Sender<PeerDelta>,
) {
    if !response.values.is_empty() {
        let delta = peers.insert_new(info_hash, response.values);
        if !delta.is_empty() {
            let emission = PeerDelta { info_hash, peers: delta };
            if results_tx.try_send(emission).is_err() {
                warn!(info_hash = %info_hash, "results channel full or closed, dropping delta emission");
            }
        }
    }

    if !response.nodes.is_empty() && !peers.at_cap(info_hash) {
        let mut discovered_any = false;
        for node_info in response.nodes {
            if table.contains(node_info.addr) {
                continue;
            }
            table.get_or_insert(node_info.addr);
            discovered_any = true;
        }
        if discovered_any {
            get_peers(table, transport, local_id, peers, info_hash);
        }
    }
}
