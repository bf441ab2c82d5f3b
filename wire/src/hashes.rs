// wire/src/hashes.rs

//! Hash digest and opaque fixed-width wire types.

use bitcoin::hashes::Hash as _;

use crate::cursor::{Cursor, WireRead, WireWrite, Writer};

/// A single SHA-256 digest (32 bytes).
pub use bitcoin::hashes::sha256::Hash as Sha256;

impl WireRead for Sha256 {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        let bytes: [u8; 32] = cursor.read();
        Sha256::from_byte_array(bytes)
    }
}

impl WireWrite for Sha256 {
    fn write(&self, writer: &mut Writer) {
        writer.push(self.as_byte_array());
    }
}

/// A wrapper around a single SHA-256 digest. Decoding never re-hashes:
/// the second SHA-256 application that gives this value its domain
/// meaning ("double SHA-256") is the caller's responsibility, by
/// convention, elsewhere in the protocol.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct Sha256D(pub Sha256);

impl std::fmt::Debug for Sha256D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha256D({})", self.0)
    }
}

impl WireRead for Sha256D {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        Sha256D(cursor.read())
    }
}

impl WireWrite for Sha256D {
    fn write(&self, writer: &mut Writer) {
        self.0.write(writer)
    }
}

/// 20-byte RIPEMD-160 digest.
pub use bitcoin::hashes::ripemd160::Hash as Ripemd160;

impl WireRead for Ripemd160 {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        let bytes: [u8; 20] = cursor.read();
        Ripemd160::from_byte_array(bytes)
    }
}

impl WireWrite for Ripemd160 {
    fn write(&self, writer: &mut Writer) {
        writer.push(self.as_byte_array());
    }
}

/// A 32-byte HTLC preimage: opaque raw bytes, not a hash.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Preimage(pub [u8; 32]);

impl WireRead for Preimage {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        Preimage(cursor.read())
    }
}

impl WireWrite for Preimage {
    fn write(&self, writer: &mut Writer) {
        writer.push(&self.0)
    }
}

impl std::fmt::Debug for Preimage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Preimage({})", hex_lower(&self.0))
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// A Bitcoin transaction id: a double-SHA-256 newtype.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct Txid(pub Sha256D);

impl std::fmt::Debug for Txid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Txid({:?})", self.0)
    }
}

impl WireRead for Txid {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        Txid(cursor.read())
    }
}

impl WireWrite for Txid {
    fn write(&self, writer: &mut Writer) {
        self.0.write(writer)
    }
}

impl Txid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0 .0.as_byte_array()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Txid(Sha256D(Sha256::from_byte_array(bytes)))
    }
}

/// A block id (block hash): a double-SHA-256 newtype.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct BlockId(pub Sha256D);

impl std::fmt::Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockId({:?})", self.0)
    }
}

impl WireRead for BlockId {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        BlockId(cursor.read())
    }
}

impl WireWrite for BlockId {
    fn write(&self, writer: &mut Writer) {
        self.0.write(writer)
    }
}

impl BlockId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0 .0.as_byte_array()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        BlockId(Sha256D(Sha256::from_byte_array(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Writer;

    #[test]
    fn sha256_round_trips() {
        let digest = Sha256::from_byte_array([0x42; 32]);
        let mut w = Writer::new();
        w.write(&digest);
        assert_eq!(w.as_slice().len(), 32);

        let mut c = Cursor::new(w.as_slice());
        let decoded: Sha256 = c.read();
        assert!(c.is_ok());
        assert_eq!(decoded, digest);
    }

    #[test]
    fn sha256d_does_not_rehash_on_decode() {
        let inner = Sha256::from_byte_array([0x07; 32]);
        let mut w = Writer::new();
        w.write(&Sha256D(inner));

        let mut c = Cursor::new(w.as_slice());
        let decoded: Sha256D = c.read();
        assert_eq!(decoded.0, inner);
    }

    #[test]
    fn txid_short_read_poisons() {
        let mut c = Cursor::new(&[0u8; 31]);
        let txid: Txid = c.read();
        assert!(!c.is_ok());
        assert_eq!(txid, Txid::default());
    }
}
