use crate::error::{BencodeError, Result};
use crate::value::BencodeValue;
use std::collections::BTreeMap;
use tracing::instrument;

/// Decodes a single bencode value from `bytes`.
///
/// Trailing bytes after the value are rejected -- a KRPC datagram carries
/// exactly one top-level dict, never a value followed by garbage.
#[instrument(skip(bytes), level = "trace")]
pub fn decode(bytes: &[u8]) -> Result<BencodeValue> {
    let mut cursor = Cursor::new(bytes);
    let value = decode_value(&mut cursor)?;
    if cursor.pos != cursor.buf.len() {
        return Err(BencodeError::TrailingData(cursor.buf.len() - cursor.pos));
    }
    Ok(value)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn peek(&self) -> Result<u8> {
        self.buf.get(self.pos).copied().ok_or(BencodeError::UnexpectedEof)
    }

    fn advance(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let got = self.advance()?;
        if got != expected {
            return Err(BencodeError::Malformed(format!(
                "expected '{}', got '{}'",
                expected as char, got as char
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(BencodeError::UnexpectedEof)?;
        if end > self.buf.len() {
            return Err(BencodeError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_until(&mut self, delimiter: u8) -> Result<&'a [u8]> {
        let start = self.pos;
        loop {
            let b = self.advance()?;
            if b == delimiter {
                return Ok(&self.buf[start..self.pos - 1]);
            }
        }
    }
}

fn decode_value(cursor: &mut Cursor) -> Result<BencodeValue> {
    match cursor.peek()? {
        b'0'..=b'9' => decode_string(cursor).map(BencodeValue::String),
        b'i' => decode_integer(cursor).map(BencodeValue::Integer),
        b'l' => decode_list(cursor).map(BencodeValue::List),
        b'd' => decode_dict(cursor).map(BencodeValue::Dict),
        other => Err(BencodeError::Malformed(format!(
            "unexpected leading byte '{}'",
            other as char
        ))),
    }
}

fn decode_string(cursor: &mut Cursor) -> Result<Vec<u8>> {
    let digits = cursor.read_until(b':')?;
    let length = parse_ascii_len(digits)?;
    Ok(cursor.take(length)?.to_vec())
}

/// Parses a decimal length prefix. Rejects anything that isn't plain ASCII
/// digits (no sign, no leading `+`) so a crafted datagram can't smuggle
/// unicode digit lookalikes or whitespace past `str::parse`.
fn parse_ascii_len(digits: &[u8]) -> Result<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(BencodeError::InvalidStringLength);
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(BencodeError::InvalidStringLength)
}

fn decode_integer(cursor: &mut Cursor) -> Result<i64> {
    cursor.expect(b'i')?;
    let digits = cursor.read_until(b'e')?;
    let text = std::str::from_utf8(digits).map_err(|_| BencodeError::InvalidInteger)?;

    if text.is_empty() || text == "-" || text == "-0" {
        return Err(BencodeError::InvalidInteger);
    }
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    if unsigned.len() > 1 && unsigned.starts_with('0') {
        return Err(BencodeError::InvalidInteger);
    }
    text.parse::<i64>().map_err(|_| BencodeError::InvalidInteger)
}

fn decode_list(cursor: &mut Cursor) -> Result<Vec<BencodeValue>> {
    cursor.expect(b'l')?;
    let mut items = Vec::new();
    loop {
        if cursor.peek()? == b'e' {
            cursor.pos += 1;
            return Ok(items);
        }
        items.push(decode_value(cursor)?);
    }
}

fn decode_dict(cursor: &mut Cursor) -> Result<BTreeMap<Vec<u8>, BencodeValue>> {
    cursor.expect(b'd')?;
    let mut dict = BTreeMap::new();
    loop {
        if cursor.peek()? == b'e' {
            cursor.pos += 1;
            return Ok(dict);
        }
        let key = decode_string(cursor)?;
        let value = decode_value(cursor)?;
        dict.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BencodeValue as V;

    #[test]
    fn decodes_string() {
        assert_eq!(decode(b"5:hello").unwrap(), V::String(b"hello".to_vec()));
    }

    #[test]
    fn decodes_integer() {
        assert_eq!(decode(b"i42e").unwrap(), V::Integer(42));
        assert_eq!(decode(b"i-3e").unwrap(), V::Integer(-3));
        assert_eq!(decode(b"i0e").unwrap(), V::Integer(0));
    }

    #[test]
    fn rejects_leading_zero_integer() {
        assert!(decode(b"i03e").is_err());
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn decodes_list_and_dict() {
        assert_eq!(
            decode(b"li1e3:fooe").unwrap(),
            V::List(vec![V::Integer(1), V::String(b"foo".to_vec())])
        );
        let d = decode(b"d3:bar4:spam3:fooi42ee").unwrap();
        let dict = d.as_dict().unwrap();
        assert_eq!(dict.get(b"bar".as_slice()).unwrap().as_bytes().unwrap(), b"spam");
        assert_eq!(dict.get(b"foo".as_slice()).unwrap().as_integer().unwrap(), 42);
    }

    #[test]
    fn never_panics_on_garbage() {
        let inputs: &[&[u8]] = &[
            b"",
            b"garbage",
            b"d",
            b"l",
            b"i",
            b"5:ab",
            b"999999999999999999999999999:x",
            b"d3:fooe",
            b"\xff\xff\xff",
            b"i--1e",
        ];
        for input in inputs {
            let _ = decode(input);
        }
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(matches!(
            decode(b"i1ei2e"),
            Err(BencodeError::TrailingData(_))
        ));
    }
}
