// wire/src/keys.rs

//! secp256k1 key and signature wire types.

use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use bitcoin::secp256k1::PublicKey;

use crate::cursor::{Cursor, WireRead, WireWrite, Writer};

/// 33-byte compressed secp256k1 public key. Decoding rejects any bytes
/// that do not parse to a valid curve point.
impl WireRead for PublicKey {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        match cursor.take(33) {
            Some(bytes) => match PublicKey::from_slice(bytes) {
                Ok(pk) => pk,
                Err(_) => {
                    cursor.poison();
                    PublicKey::from_slice(&DUMMY_COMPRESSED_POINT)
                        .expect("dummy point is a valid curve point")
                }
            },
            None => PublicKey::from_slice(&DUMMY_COMPRESSED_POINT)
                .expect("dummy point is a valid curve point"),
        }
    }
}

impl WireWrite for PublicKey {
    fn write(&self, writer: &mut Writer) {
        writer.push(&self.serialize());
    }
}

/// Generator point, used as the "zeroed" `PublicKey` default: there is no
/// all-zero byte string that parses as a curve point, so unlike the
/// integer primitives we cannot return a literal zero value on failure.
const DUMMY_COMPRESSED_POINT: [u8; 33] = [
    0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b,
    0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17,
    0x98,
];

/// Raw 32-byte secret scalar, unvalidated at decode time (unlike
/// `secp256k1::SecretKey`, which rejects zero and out-of-range values).
/// Validate on first use via [`SecretKey::to_secp`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SecretKey(pub [u8; 32]);

impl Default for SecretKey {
    fn default() -> Self {
        SecretKey([0u8; 32])
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"<redacted>").finish()
    }
}

impl SecretKey {
    /// Validate these bytes as a secp256k1 scalar.
    pub fn to_secp(&self) -> Result<bitcoin::secp256k1::SecretKey, bitcoin::secp256k1::Error> {
        bitcoin::secp256k1::SecretKey::from_slice(&self.0)
    }
}

impl WireRead for SecretKey {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        SecretKey(cursor.read())
    }
}

impl WireWrite for SecretKey {
    fn write(&self, writer: &mut Writer) {
        writer.push(&self.0);
    }
}

/// 64-byte compact (r || s) ECDSA signature.
impl WireRead for Signature {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        match cursor.take(64) {
            Some(bytes) => {
                let mut arr = [0u8; 64];
                arr.copy_from_slice(bytes);
                match Signature::from_compact(&arr) {
                    Ok(sig) => sig,
                    Err(_) => {
                        cursor.poison();
                        Signature::default_zeroed()
                    }
                }
            }
            None => Signature::default_zeroed(),
        }
    }
}

impl WireWrite for Signature {
    fn write(&self, writer: &mut Writer) {
        writer.push(&self.serialize_compact());
    }
}

/// Extension to produce a placeholder `Signature` for the poisoned-decode
/// path. `Signature::from_compact` never accepts all-zero bytes, so (as
/// with `PublicKey`) we fabricate a structurally valid-but-meaningless
/// value rather than attempt to represent "no signature" in-band.
trait ZeroedSignature {
    fn default_zeroed() -> Self;
}

impl ZeroedSignature for Signature {
    fn default_zeroed() -> Self {
        // r = s = 1 is a structurally valid compact signature (both
        // halves nonzero and below the curve order).
        let mut compact = [0u8; 64];
        compact[31] = 1;
        compact[63] = 1;
        Signature::from_compact(&compact).expect("r=s=1 is a valid compact signature")
    }
}

/// 64 compact bytes followed by a one-byte recovery id.
pub struct Recoverable(pub RecoverableSignature);

impl Default for Recoverable {
    fn default() -> Self {
        let mut compact = [0u8; 64];
        compact[31] = 1;
        compact[63] = 1;
        let recid = RecoveryId::from_i32(0).expect("0 is always a valid recovery id");
        Recoverable(
            RecoverableSignature::from_compact(&compact, recid)
                .expect("r=s=1 is a valid compact signature"),
        )
    }
}

impl WireRead for Recoverable {
    fn read(cursor: &mut Cursor<'_>) -> Self {
        let compact: [u8; 64] = cursor.read();
        let recid_byte: u8 = cursor.read();
        if !cursor.is_ok() {
            return Recoverable::default();
        }
        let recid = match RecoveryId::from_i32(recid_byte as i32) {
            Ok(r) => r,
            Err(_) => {
                cursor.poison();
                return Recoverable::default();
            }
        };
        match RecoverableSignature::from_compact(&compact, recid) {
            Ok(sig) => Recoverable(sig),
            Err(_) => {
                cursor.poison();
                Recoverable::default()
            }
        }
    }
}

impl WireWrite for Recoverable {
    fn write(&self, writer: &mut Writer) {
        let (recid, compact) = self.0.serialize_compact();
        writer.push(&compact);
        writer.push(&[recid.to_i32() as u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Secp256k1, SecretKey as SecpSecretKey};

    fn sample_pubkey() -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecpSecretKey::from_slice(&[0x11; 32]).unwrap();
        PublicKey::from_secret_key(&secp, &sk)
    }

    #[test]
    fn pubkey_round_trips() {
        let pk = sample_pubkey();
        let mut w = crate::cursor::Writer::new();
        w.write(&pk);
        assert_eq!(w.as_slice().len(), 33);

        let mut c = Cursor::new(w.as_slice());
        let decoded: PublicKey = c.read();
        assert!(c.is_ok());
        assert_eq!(decoded, pk);
    }

    #[test]
    fn pubkey_rejects_invalid_point() {
        let mut bad = [0u8; 33];
        bad[0] = 0x04; // invalid prefix for a compressed point
        let mut c = Cursor::new(&bad);
        let _: PublicKey = c.read();
        assert!(!c.is_ok());
    }

    #[test]
    fn secret_key_accepts_anything() {
        // Spec requires no validation at decode time, unlike secp256k1::SecretKey.
        let mut c = Cursor::new(&[0u8; 32]);
        let sk: SecretKey = c.read();
        assert!(c.is_ok());
        assert_eq!(sk.0, [0u8; 32]);
        // the all-zero scalar is invalid once actually used as a secp256k1 key
        assert!(sk.to_secp().is_err());
    }

    #[test]
    fn recoverable_signature_round_trips() {
        let secp = Secp256k1::new();
        let sk = SecpSecretKey::from_slice(&[0x22; 32]).unwrap();
        let msg = bitcoin::secp256k1::Message::from_digest([0x33; 32]);
        let sig = secp.sign_ecdsa_recoverable(&msg, &sk);

        let mut w = crate::cursor::Writer::new();
        w.write(&Recoverable(sig));
        assert_eq!(w.as_slice().len(), 65);

        let mut c = Cursor::new(w.as_slice());
        let decoded: Recoverable = c.read();
        assert!(c.is_ok());
        assert_eq!(decoded.0, sig);
    }
}
