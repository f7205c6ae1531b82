use std::collections::BTreeMap;

/// A decoded (or to-be-encoded) bencode value.
///
/// Dictionary keys are kept in a `BTreeMap` rather than a `HashMap` so that
/// key order is canonical (byte-lexicographic) for free on encode, while
/// still tolerating any key order a remote peer happened to emit on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    String(Vec<u8>),
    Integer(i64),
    List(Vec<BencodeValue>),
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    pub fn string(bytes: impl Into<Vec<u8>>) -> BencodeValue {
        BencodeValue::String(bytes.into())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            BencodeValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up a key in a dict value by its string form. Returns `None`
    /// both when this isn't a dict and when the key is absent.
    pub fn get(&self, key: &str) -> Option<&BencodeValue> {
        self.as_dict()?.get(key.as_bytes())
    }
}

/// Builder for canonical-order outbound dicts.
#[derive(Debug, Default, Clone)]
pub struct DictBuilder(BTreeMap<Vec<u8>, BencodeValue>);

impl DictBuilder {
    pub fn new() -> Self {
        DictBuilder(BTreeMap::new())
    }

    pub fn insert(mut self, key: &str, value: BencodeValue) -> Self {
        self.0.insert(key.as_bytes().to_vec(), value);
        self
    }

    pub fn build(self) -> BencodeValue {
        BencodeValue::Dict(self.0)
    }
}
