// wire/src/lib.rs

//! `wire` implements the BOLT binary message encoding used between
//! Lightning peers: big-endian integers, fixed-width byte arrays,
//! secp256k1 keys and signatures, double-SHA-256 identifiers, and the
//! channel identifiers derived from a funding outpoint.
//!
//! Every decode function advances a [`Cursor`] by exactly its wire
//! width on success, or poisons the cursor and returns a zeroed value
//! on failure. There is no error type on the decode path: callers
//! check `cursor.is_ok()` once after decoding a whole message, not
//! after each field. See [`Cursor`] for the full contract.

mod channel_id;
mod cursor;
mod hashes;
mod keys;
mod primitives;

pub use channel_id::{derive_channel_id, ChannelId, ShortChannelId, ShortChannelIdError};
pub use cursor::{Cursor, WireRead, WireWrite, Writer};
pub use hashes::{BlockId, Preimage, Ripemd160, Sha256, Sha256D, Txid};
pub use keys::{Recoverable, SecretKey};
pub use primitives::peek_type;

// Re-exported so downstream crates can name `PublicKey` / `Signature`
// without taking a direct `bitcoin` dependency of their own.
pub use bitcoin::secp256k1::ecdsa::Signature;
pub use bitcoin::secp256k1::PublicKey;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn u32_round_trips(v in any::<u32>()) {
            let mut w = Writer::new();
            w.write(&v);
            let mut c = Cursor::new(w.as_slice());
            let decoded: u32 = c.read();
            prop_assert!(c.is_ok());
            prop_assert_eq!(decoded, v);
        }

        #[test]
        fn u64_short_buffer_poisons(len in 0usize..8) {
            let bytes = vec![0xffu8; len];
            let mut c = Cursor::new(&bytes);
            let decoded: u64 = c.read();
            prop_assert!(!c.is_ok());
            prop_assert_eq!(decoded, 0);
        }

        #[test]
        fn short_channel_id_round_trips(
            block in 0u32..(1 << 24),
            tx_index in 0u32..(1 << 24),
            output_index in any::<u16>(),
        ) {
            let scid = ShortChannelId::new(block, tx_index, output_index).unwrap();
            let mut w = Writer::new();
            w.write(&scid);
            prop_assert_eq!(w.as_slice().len(), 8);

            let mut c = Cursor::new(w.as_slice());
            let decoded: ShortChannelId = c.read();
            prop_assert!(c.is_ok());
            prop_assert_eq!(decoded, scid);
        }

        #[test]
        fn derive_channel_id_only_touches_last_two_bytes(
            txid_bytes in any::<[u8; 32]>(),
            txout in any::<u16>(),
        ) {
            let txid = Txid::from_bytes(txid_bytes);
            let cid = derive_channel_id(&txid, txout);
            let idx = txout.to_be_bytes();
            for i in 0..30 {
                prop_assert_eq!(cid.0[i], txid_bytes[i]);
            }
            prop_assert_eq!(cid.0[30], txid_bytes[30] ^ idx[0]);
            prop_assert_eq!(cid.0[31], txid_bytes[31] ^ idx[1]);
        }
    }
}
