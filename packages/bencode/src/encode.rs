use crate::value::BencodeValue;
use tracing::instrument;

/// Encodes `value` to its canonical bencode representation.
///
/// Dict keys are always emitted in byte-lexicographic order (the value's
/// `BTreeMap` backing already guarantees this), so two calls with
/// structurally equal input always produce identical bytes.
#[instrument(skip(value), level = "trace")]
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BencodeValue, out: &mut Vec<u8>) {
    match value {
        BencodeValue::String(s) => {
            out.extend_from_slice(s.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(s);
        }
        BencodeValue::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        BencodeValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BencodeValue::Dict(dict) => {
            out.push(b'd');
            for (key, value) in dict {
                encode_into(&BencodeValue::String(key.clone()), out);
                encode_into(value, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DictBuilder;

    #[test]
    fn encodes_atoms() {
        assert_eq!(encode(&BencodeValue::Integer(42)), b"i42e");
        assert_eq!(encode(&BencodeValue::string(*b"spam")), b"4:spam");
    }

    #[test]
    fn sorts_dict_keys_lexicographically_regardless_of_insertion_order() {
        let a = DictBuilder::new()
            .insert("z", BencodeValue::Integer(1))
            .insert("a", BencodeValue::Integer(2))
            .build();
        let b = DictBuilder::new()
            .insert("a", BencodeValue::Integer(2))
            .insert("z", BencodeValue::Integer(1))
            .build();
        assert_eq!(encode(&a), encode(&b));
        assert_eq!(encode(&a), b"d1:ai2e1:zi1ee");
    }
}
