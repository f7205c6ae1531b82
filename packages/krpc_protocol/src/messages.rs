use crate::addr::Addr;
use crate::error::{KrpcError, Result};
use crate::node_id::{Id20, InfoHash, NodeId};
use crate::node_info::{self, NodeInfo};
use crate::transaction::TransactionId;
use bencode::{BencodeValue, DictBuilder};
use tracing::{instrument, warn};

/// A fully decoded KRPC datagram. Mirrors BEP-0005's `y` discriminant:
/// `"q"` (query), `"r"` (response), `"e"` (error). Only `Response` is ever
/// acted on by this crawler -- `Query` and `Error` are decoded so they can
/// be logged and dropped rather than tripping `MalformedBencode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Query { tid: TransactionId, query: Query },
    Response { tid: TransactionId, response: Response },
    Error { tid: TransactionId, error: KrpcErrorPayload },
}

/// Queries this crawler can emit. BEP-0005 also defines `find_node` and
/// `announce_peer`, which this crawler never sends;
/// `Other` exists purely so an inbound query of some other kind still
/// decodes instead of failing the whole datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ping { id: NodeId },
    GetPeers { id: NodeId, info_hash: InfoHash },
    Other { name: Vec<u8> },
}

/// Fields consumed from a response dict. `values` and `nodes` may both be
/// non-empty on the same response -- a well-behaved remote sends one or
/// the other, but nothing requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: NodeId,
    pub token: Option<Vec<u8>>,
    pub values: Vec<Addr>,
    pub nodes: Vec<NodeInfo>,
}

/// `(error_code, message)` payload of a `y == "e"` datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrpcErrorPayload(pub i64, pub String);

/// Builds the wire bytes for a `ping` query.
///
/// Canonical vector: `ping("abcdefghij0123456789", "aa")` encodes to
/// `d1:ad2:id20:abcdefghij0123456789e1:q4:ping1:t2:aa1:y1:qe`.
#[instrument(skip(id), level = "trace")]
pub fn encode_ping(id: NodeId, tid: &TransactionId) -> Vec<u8> {
    let args = DictBuilder::new()
        .insert("id", BencodeValue::string(id.to_vec()))
        .build();
    encode_query(tid, "ping", args)
}

/// Builds the wire bytes for a `get_peers` query.
///
/// Canonical vector: `get_peers(id, "mnopqrstuvwxyz123456", "aa")` encodes
/// to `d1:ad2:id20:abcdefghij01234567899:info_hash20:mnopqrstuvwxyz123456e1:q9:get_peers1:t2:aa1:y1:qe`.
#[instrument(skip(id, info_hash), level = "trace")]
pub fn encode_get_peers(id: NodeId, info_hash: InfoHash, tid: &TransactionId) -> Vec<u8> {
    let args = DictBuilder::new()
        .insert("id", BencodeValue::string(id.to_vec()))
        .insert("info_hash", BencodeValue::string(info_hash.to_vec()))
        .build();
    encode_query(tid, "get_peers", args)
}

fn encode_query(tid: &TransactionId, name: &str, args: BencodeValue) -> Vec<u8> {
    let message = DictBuilder::new()
        .insert("t", BencodeValue::string(tid.as_bytes().to_vec()))
        .insert("y", BencodeValue::string(b"q".to_vec()))
        .insert("q", BencodeValue::string(name.as_bytes().to_vec()))
        .insert("a", args)
        .build();
    bencode::encode(&message)
}

/// Decodes an inbound KRPC datagram. Fails only on syntax-level problems
/// (bad bencode, missing `t`/`y`, `y` not one of `q`/`r`/`e`). Field-level
/// problems inside a response (bad `nodes` length, non-contact `values`)
/// are logged and the offending field is dropped -- the message still
/// decodes.
#[instrument(skip(bytes), level = "trace")]
pub fn decode(bytes: &[u8]) -> Result<Message> {
    let value = bencode::decode(bytes)?;
    let tid_bytes = value
        .get("t")
        .and_then(BencodeValue::as_bytes)
        .ok_or_else(|| KrpcError::UnexpectedMessage("missing transaction id".to_string()))?;
    let tid = TransactionId::from_bytes(tid_bytes.to_vec());

    let y = value
        .get("y")
        .and_then(BencodeValue::as_bytes)
        .ok_or_else(|| KrpcError::UnexpectedMessage("missing 'y'".to_string()))?;

    match y {
        b"r" => {
            let r = value
                .get("r")
                .ok_or_else(|| KrpcError::UnexpectedMessage("response missing 'r'".to_string()))?;
            Ok(Message::Response {
                tid,
                response: decode_response(r)?,
            })
        }
        b"q" => Ok(Message::Query {
            tid,
            query: decode_query(&value)?,
        }),
        b"e" => Ok(Message::Error {
            tid,
            error: decode_error(&value)?,
        }),
        other => Err(KrpcError::UnexpectedMessage(format!(
            "unknown y discriminant {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn decode_query(message: &BencodeValue) -> Result<Query> {
    let name = message
        .get("q")
        .and_then(BencodeValue::as_bytes)
        .ok_or_else(|| KrpcError::UnexpectedMessage("query missing 'q'".to_string()))?;
    let args = message
        .get("a")
        .ok_or_else(|| KrpcError::UnexpectedMessage("query missing 'a'".to_string()))?;

    match name {
        b"ping" => Ok(Query::Ping { id: decode_id(args, "id")? }),
        b"get_peers" => Ok(Query::GetPeers {
            id: decode_id(args, "id")?,
            info_hash: decode_id(args, "info_hash")?,
        }),
        other => Ok(Query::Other { name: other.to_vec() }),
    }
}

fn decode_error(message: &BencodeValue) -> Result<KrpcErrorPayload> {
    let list = message
        .get("e")
        .and_then(BencodeValue::as_list)
        .ok_or_else(|| KrpcError::UnexpectedMessage("error missing 'e' list".to_string()))?;
    let code = list
        .first()
        .and_then(BencodeValue::as_integer)
        .ok_or_else(|| KrpcError::UnexpectedMessage("error list missing code".to_string()))?;
    let text = list
        .get(1)
        .and_then(BencodeValue::as_bytes)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    Ok(KrpcErrorPayload(code, text))
}

fn decode_response(r: &BencodeValue) -> Result<Response> {
    let id = decode_id(r, "id")?;
    let token = r.get("token").and_then(BencodeValue::as_bytes).map(|b| b.to_vec());

    let values = r
        .get("values")
        .and_then(BencodeValue::as_list)
        .map(|list| {
            list.iter()
                .filter_map(BencodeValue::as_bytes)
                .filter_map(|bytes| match Addr::from_compact(bytes) {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed compact peer contact");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let nodes = r
        .get("nodes")
        .and_then(BencodeValue::as_bytes)
        .map(|bytes| match node_info::parse_compact_nodes(bytes) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "discarding malformed compact nodes field");
                Vec::new()
            }
        })
        .unwrap_or_default();

    Ok(Response { id, token, values, nodes })
}

fn decode_id(dict_value: &BencodeValue, key: &str) -> Result<Id20> {
    let bytes = dict_value
        .get(key)
        .and_then(BencodeValue::as_bytes)
        .ok_or_else(|| KrpcError::UnexpectedMessage(format!("missing '{}'", key)))?;
    Id20::from_slice(bytes)
}
