/// A short octet string correlating a query with its response.
///
/// The local node allocates these monotonically per remote, modulo 256,
/// which is why the common case is a single byte; the type itself allows
/// up to two bytes since BEP-0005 doesn't mandate a width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(Vec<u8>);

impl TransactionId {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> TransactionId {
        TransactionId(bytes.into())
    }

    pub fn from_u8(value: u8) -> TransactionId {
        TransactionId(vec![value])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
