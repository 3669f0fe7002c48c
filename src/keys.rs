//! Key envelopes and key material extraction.
//!
//! Peer keys travel as a two-field binary envelope, the same layout the
//! daemon's own configuration serializer produces: field 1 is a varint
//! algorithm tag, field 2 the length-delimited opaque payload. Decoding is
//! strict, exactly those two fields in order and nothing after them.

use std::fmt;

use der::{asn1::UintRef, Decode, Sequence};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use unsigned_varint::{decode as varint_decode, encode as varint_encode};

use crate::error::{Error, Result};

/// Supported key algorithms, tagged with their wire values.
///
/// `Secp256k1` and `Ecdh` are representable so their envelopes round-trip,
/// but no key material extraction is defined for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum KeyType {
    Rsa = 0,
    Ed25519 = 1,
    Secp256k1 = 2,
    Ecdh = 4,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Rsa => write!(f, "RSA"),
            KeyType::Ed25519 => write!(f, "Ed25519"),
            KeyType::Secp256k1 => write!(f, "Secp256k1"),
            KeyType::Ecdh => write!(f, "ECDH"),
        }
    }
}

/// A public key envelope: algorithm tag plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: KeyType,
    pub data: Vec<u8>,
}

/// A private key envelope. Structurally identical to [`PublicKey`] but the
/// two are never interchanged; the payload is opaque until extracted.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub key_type: KeyType,
    pub data: Vec<u8>,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print private key bytes
        write!(f, "PrivateKey({:?}, {} bytes)", self.key_type, self.data.len())
    }
}

impl PublicKey {
    pub fn new(key_type: KeyType, data: Vec<u8>) -> Self {
        PublicKey { key_type, data }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (key_type, data) = decode_envelope(bytes)?;
        Ok(PublicKey { key_type, data })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_envelope(self.key_type, &self.data)
    }
}

impl PrivateKey {
    pub fn new(key_type: KeyType, data: Vec<u8>) -> Self {
        PrivateKey { key_type, data }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (key_type, data) = decode_envelope(bytes)?;
        Ok(PrivateKey { key_type, data })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_envelope(self.key_type, &self.data)
    }

    /// Extracts the algorithm-specific key material from this envelope.
    pub fn extract(&self) -> Result<KeyMaterial> {
        match self.key_type {
            KeyType::Rsa => Ok(KeyMaterial::Rsa(RsaKeyMaterial::from_pkcs1_der(&self.data)?)),
            KeyType::Ed25519 => Ok(KeyMaterial::Ed25519(Ed25519KeyMaterial::from_raw(
                &self.data,
            )?)),
            kt @ (KeyType::Secp256k1 | KeyType::Ecdh) => Err(Error::UnsupportedKeyType(kt)),
        }
    }
}

const TYPE_FIELD: u8 = 0x08; // field 1, varint
const DATA_FIELD: u8 = 0x12; // field 2, length-delimited

fn encode_envelope(key_type: KeyType, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 8);
    let mut buf = varint_encode::u64_buffer();
    out.push(TYPE_FIELD);
    out.extend_from_slice(varint_encode::u64(u8::from(key_type) as u64, &mut buf));
    out.push(DATA_FIELD);
    out.extend_from_slice(varint_encode::u64(data.len() as u64, &mut buf));
    out.extend_from_slice(data);
    out
}

fn decode_envelope(bytes: &[u8]) -> Result<(KeyType, Vec<u8>)> {
    let (&header, rest) = bytes
        .split_first()
        .ok_or_else(|| Error::Format("empty input".into()))?;
    if header != TYPE_FIELD {
        return Err(Error::Format(format!("expected key type field, got 0x{header:02x}")));
    }
    let (tag, rest) =
        varint_decode::u64(rest).map_err(|e| Error::Format(format!("bad key type tag: {e}")))?;
    let key_type = u8::try_from(tag)
        .ok()
        .and_then(|t| KeyType::try_from(t).ok())
        .ok_or_else(|| Error::Format(format!("unknown key type tag {tag}")))?;

    let (&header, rest) = rest
        .split_first()
        .ok_or_else(|| Error::Format("missing key data field".into()))?;
    if header != DATA_FIELD {
        return Err(Error::Format(format!("expected key data field, got 0x{header:02x}")));
    }
    let (len, rest) =
        varint_decode::u64(rest).map_err(|e| Error::Format(format!("bad key data length: {e}")))?;
    if rest.len() as u64 != len {
        return Err(Error::Format(format!(
            "key data length {} does not match remaining {} bytes",
            len,
            rest.len()
        )));
    }
    Ok((key_type, rest.to_vec()))
}

/// Key material extracted from a private key envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Rsa(RsaKeyMaterial),
    Ed25519(Ed25519KeyMaterial),
}

/// The eight RSA private key parameters, as unsigned big-endian bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaKeyMaterial {
    pub modulus: Vec<u8>,
    pub public_exponent: Vec<u8>,
    pub private_exponent: Vec<u8>,
    pub prime1: Vec<u8>,
    pub prime2: Vec<u8>,
    pub exponent1: Vec<u8>,
    pub exponent2: Vec<u8>,
    pub coefficient: Vec<u8>,
}

impl fmt::Debug for RsaKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaKeyMaterial({} bit modulus)", self.modulus.len() * 8)
    }
}

/// The conventional RSA private key structure: an ASN.1 SEQUENCE of exactly
/// nine INTEGERs (version plus the eight parameters). Deriving [`Sequence`]
/// makes the field count structural: eight or ten integers fail to decode.
#[derive(Sequence)]
struct RsaPrivateKeyDer<'a> {
    version: UintRef<'a>,
    modulus: UintRef<'a>,
    public_exponent: UintRef<'a>,
    private_exponent: UintRef<'a>,
    prime1: UintRef<'a>,
    prime2: UintRef<'a>,
    exponent1: UintRef<'a>,
    exponent2: UintRef<'a>,
    coefficient: UintRef<'a>,
}

impl RsaKeyMaterial {
    /// Parses a PKCS#1 DER payload. The version field is validated as part
    /// of the sequence and then discarded.
    pub fn from_pkcs1_der(payload: &[u8]) -> Result<Self> {
        let key = RsaPrivateKeyDer::from_der(payload).map_err(|e| Error::MalformedKey {
            algorithm: KeyType::Rsa,
            reason: e.to_string(),
        })?;
        Ok(RsaKeyMaterial {
            modulus: key.modulus.as_bytes().to_vec(),
            public_exponent: key.public_exponent.as_bytes().to_vec(),
            private_exponent: key.private_exponent.as_bytes().to_vec(),
            prime1: key.prime1.as_bytes().to_vec(),
            prime2: key.prime2.as_bytes().to_vec(),
            exponent1: key.exponent1.as_bytes().to_vec(),
            exponent2: key.exponent2.as_bytes().to_vec(),
            coefficient: key.coefficient.as_bytes().to_vec(),
        })
    }
}

/// Ed25519 key material: the 32 byte seed, plus the public half when the
/// payload carried one.
///
/// Accepted payload layouts are `seed` (32 bytes), `seed || public`
/// (64 bytes) and `seed || public || public` (96 bytes, a non-standard
/// extension). In the 96 byte form the trailing copy of the public key is
/// accepted without being compared to the middle copy; upstream never
/// validates it and rejecting a mismatch would refuse previously accepted
/// key files.
#[derive(Clone, PartialEq, Eq)]
pub struct Ed25519KeyMaterial {
    pub seed: [u8; 32],
    pub public: Option<[u8; 32]>,
}

impl fmt::Debug for Ed25519KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ed25519KeyMaterial(seed, public: {})",
            self.public.is_some()
        )
    }
}

impl Ed25519KeyMaterial {
    pub fn from_raw(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(payload);
                Ok(Ed25519KeyMaterial { seed, public: None })
            }
            64 | 96 => {
                let mut seed = [0u8; 32];
                let mut public = [0u8; 32];
                seed.copy_from_slice(&payload[..32]);
                public.copy_from_slice(&payload[32..64]);
                Ok(Ed25519KeyMaterial {
                    seed,
                    public: Some(public),
                })
            }
            n => Err(Error::MalformedKey {
                algorithm: KeyType::Ed25519,
                reason: format!("expected 32, 64 or 96 bytes, got {n}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use der::Encode;

    use super::*;

    fn rsa_test_payload() -> Vec<u8> {
        RsaPrivateKeyDer {
            version: UintRef::new(&[0x00]).unwrap(),
            modulus: UintRef::new(&[0x37, 0x13]).unwrap(),
            public_exponent: UintRef::new(&[0x01, 0x00, 0x01]).unwrap(),
            private_exponent: UintRef::new(&[0x11, 0x22]).unwrap(),
            prime1: UintRef::new(&[0x61]).unwrap(),
            prime2: UintRef::new(&[0x53]).unwrap(),
            exponent1: UintRef::new(&[0x09]).unwrap(),
            exponent2: UintRef::new(&[0x0b]).unwrap(),
            coefficient: UintRef::new(&[0x0d]).unwrap(),
        }
        .to_der()
        .unwrap()
    }

    #[test]
    fn envelope_round_trip() {
        for key_type in [
            KeyType::Rsa,
            KeyType::Ed25519,
            KeyType::Secp256k1,
            KeyType::Ecdh,
        ] {
            let key = PrivateKey::new(key_type, vec![1, 2, 3, 4, 5]);
            let decoded = PrivateKey::from_bytes(&key.to_bytes()).unwrap();
            assert_eq!(key, decoded);
        }

        // empty payloads round-trip too
        let key = PublicKey::new(KeyType::Ed25519, vec![]);
        assert_eq!(PublicKey::from_bytes(&key.to_bytes()).unwrap(), key);
    }

    #[test]
    fn envelope_wire_layout() {
        let key = PublicKey::new(KeyType::Ed25519, vec![0xaa, 0xbb]);
        assert_eq!(key.to_bytes(), vec![0x08, 0x01, 0x12, 0x02, 0xaa, 0xbb]);
    }

    #[test]
    fn decode_rejects_malformed_envelopes() {
        // empty
        assert!(matches!(
            PrivateKey::from_bytes(&[]),
            Err(Error::Format(_))
        ));
        // wrong first field
        assert!(matches!(
            PrivateKey::from_bytes(&[0x12, 0x01, 0x00]),
            Err(Error::Format(_))
        ));
        // unknown algorithm tag
        assert!(matches!(
            PrivateKey::from_bytes(&[0x08, 0x03, 0x12, 0x00]),
            Err(Error::Format(_))
        ));
        // missing data field
        assert!(matches!(
            PrivateKey::from_bytes(&[0x08, 0x01]),
            Err(Error::Format(_))
        ));
        // truncated payload
        assert!(matches!(
            PrivateKey::from_bytes(&[0x08, 0x01, 0x12, 0x04, 0xaa]),
            Err(Error::Format(_))
        ));
        // trailing bytes
        assert!(matches!(
            PrivateKey::from_bytes(&[0x08, 0x01, 0x12, 0x01, 0xaa, 0x00]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn extract_rsa() {
        let key = PrivateKey::new(KeyType::Rsa, rsa_test_payload());
        let KeyMaterial::Rsa(rsa) = key.extract().unwrap() else {
            panic!("expected RSA material");
        };
        assert_eq!(rsa.modulus, vec![0x37, 0x13]);
        assert_eq!(rsa.public_exponent, vec![0x01, 0x00, 0x01]);
        assert_eq!(rsa.coefficient, vec![0x0d]);
    }

    #[test]
    fn extract_rsa_rejects_wrong_field_count() {
        #[derive(Sequence)]
        struct EightInts<'a> {
            f0: UintRef<'a>,
            f1: UintRef<'a>,
            f2: UintRef<'a>,
            f3: UintRef<'a>,
            f4: UintRef<'a>,
            f5: UintRef<'a>,
            f6: UintRef<'a>,
            f7: UintRef<'a>,
        }
        #[derive(Sequence)]
        struct TenInts<'a> {
            f0: UintRef<'a>,
            f1: UintRef<'a>,
            f2: UintRef<'a>,
            f3: UintRef<'a>,
            f4: UintRef<'a>,
            f5: UintRef<'a>,
            f6: UintRef<'a>,
            f7: UintRef<'a>,
            f8: UintRef<'a>,
            f9: UintRef<'a>,
        }

        let one = UintRef::new(&[0x01]).unwrap();
        let eight = EightInts {
            f0: one,
            f1: one,
            f2: one,
            f3: one,
            f4: one,
            f5: one,
            f6: one,
            f7: one,
        }
        .to_der()
        .unwrap();
        let ten = TenInts {
            f0: one,
            f1: one,
            f2: one,
            f3: one,
            f4: one,
            f5: one,
            f6: one,
            f7: one,
            f8: one,
            f9: one,
        }
        .to_der()
        .unwrap();

        for payload in [eight, ten, b"not der at all".to_vec()] {
            let key = PrivateKey::new(KeyType::Rsa, payload);
            assert!(matches!(
                key.extract(),
                Err(Error::MalformedKey {
                    algorithm: KeyType::Rsa,
                    ..
                })
            ));
        }
    }

    #[test]
    fn extract_ed25519_lengths() {
        for len in [32usize, 64, 96] {
            let key = PrivateKey::new(KeyType::Ed25519, vec![7; len]);
            let KeyMaterial::Ed25519(ed) = key.extract().unwrap() else {
                panic!("expected Ed25519 material");
            };
            assert_eq!(ed.seed, [7; 32]);
            assert_eq!(ed.public.is_some(), len > 32);
        }

        for len in [0usize, 31, 65, 97] {
            let key = PrivateKey::new(KeyType::Ed25519, vec![7; len]);
            assert!(matches!(
                key.extract(),
                Err(Error::MalformedKey {
                    algorithm: KeyType::Ed25519,
                    ..
                })
            ));
        }
    }

    #[test]
    fn extract_ed25519_ignores_mismatched_duplicate_public() {
        // 96 byte form where the trailing copy differs from the middle one;
        // upstream accepts this, so must we.
        let mut payload = vec![1; 96];
        payload[64..].fill(2);
        let key = PrivateKey::new(KeyType::Ed25519, payload);
        let KeyMaterial::Ed25519(ed) = key.extract().unwrap() else {
            panic!("expected Ed25519 material");
        };
        assert_eq!(ed.public, Some([1; 32]));
    }

    #[test]
    fn extract_unsupported_key_types() {
        for key_type in [KeyType::Secp256k1, KeyType::Ecdh] {
            let key = PrivateKey::new(key_type, vec![1, 2, 3]);
            assert!(matches!(
                key.extract(),
                Err(Error::UnsupportedKeyType(kt)) if kt == key_type
            ));
        }
    }
}
