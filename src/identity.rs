//! Peer identities and private key verification.
//!
//! A peer identity is a multihash fingerprint of the peer's public key
//! envelope in its canonical wire encoding: inlined verbatim when the
//! encoding is short enough, hashed with sha2-256 otherwise. Verifying a
//! daemon means deriving the identity its configured private key should
//! produce and comparing it byte for byte against the identity the daemon
//! reports about itself.

use std::fmt;
use std::str::FromStr;

use der::asn1::{AnyRef, BitStringRef, ObjectIdentifier, UintRef};
use der::{Encode, Sequence};
use ed25519_dalek::SigningKey;
use multihash::{Code, MultihashDigest};
use spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};

use crate::error::{Error, Result};
use crate::keys::{Ed25519KeyMaterial, KeyMaterial, KeyType, PrivateKey, PublicKey, RsaKeyMaterial};

/// Public key encodings up to this size are inlined into the identity as an
/// identity multihash instead of being hashed.
const MAX_INLINE_KEY_LENGTH: usize = 42;

const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// An opaque peer fingerprint. Two identities are equal iff their bytes are.
///
/// The text form is base58btc. Parsing does not insist the decoded bytes
/// form a well-formed multihash; identities received over the wire are
/// compared as raw bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    bytes: Vec<u8>,
}

impl PeerId {
    /// Derives the identity for a public key envelope.
    pub fn from_public_key(key: &PublicKey) -> PeerId {
        let encoded = key.to_bytes();
        let multihash = if encoded.len() <= MAX_INLINE_KEY_LENGTH {
            Code::Identity.digest(&encoded)
        } else {
            Code::Sha2_256.digest(&encoded)
        };
        PeerId {
            bytes: multihash.to_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.bytes).into_string())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

impl FromStr for PeerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s).into_vec()?;
        Ok(PeerId { bytes })
    }
}

/// The RSAPublicKey structure carried inside the SubjectPublicKeyInfo.
#[derive(Sequence)]
struct RsaPublicKeyDer<'a> {
    modulus: UintRef<'a>,
    public_exponent: UintRef<'a>,
}

impl KeyMaterial {
    /// Derives the public key envelope corresponding to this key material.
    ///
    /// RSA public keys are re-encoded as an X.509 SubjectPublicKeyInfo,
    /// Ed25519 public keys as the raw 32 bytes, matching what the daemon
    /// itself would serialize.
    pub fn to_public(&self) -> Result<PublicKey> {
        match self {
            KeyMaterial::Rsa(rsa) => {
                Ok(PublicKey::new(KeyType::Rsa, rsa_spki_der(rsa)?))
            }
            KeyMaterial::Ed25519(ed) => {
                Ok(PublicKey::new(KeyType::Ed25519, ed.public().to_vec()))
            }
        }
    }
}

impl Ed25519KeyMaterial {
    /// The public half, taken from the payload when present and otherwise
    /// derived from the seed.
    pub fn public(&self) -> [u8; 32] {
        match self.public {
            Some(public) => public,
            None => SigningKey::from_bytes(&self.seed).verifying_key().to_bytes(),
        }
    }
}

fn rsa_spki_der(rsa: &RsaKeyMaterial) -> Result<Vec<u8>> {
    let malformed = |e: der::Error| Error::MalformedKey {
        algorithm: KeyType::Rsa,
        reason: e.to_string(),
    };
    let public_key = RsaPublicKeyDer {
        modulus: UintRef::new(&rsa.modulus).map_err(malformed)?,
        public_exponent: UintRef::new(&rsa.public_exponent).map_err(malformed)?,
    }
    .to_der()
    .map_err(malformed)?;
    let spki = SubjectPublicKeyInfoRef {
        algorithm: AlgorithmIdentifierRef {
            oid: RSA_ENCRYPTION_OID,
            parameters: Some(AnyRef::NULL),
        },
        subject_public_key: BitStringRef::from_bytes(&public_key).map_err(malformed)?,
    };
    spki.to_der().map_err(malformed)
}

/// Checks that `claimed` is the identity belonging to `key`.
///
/// A mismatch means the endpoint reporting `claimed` does not hold this
/// private key, for example because the daemon was swapped out underneath
/// its configuration. Callers must surface [`Error::IdentityMismatch`],
/// never retry or default past it.
pub fn verify_private_key(key: &PrivateKey, claimed: &PeerId) -> Result<()> {
    let public = key.extract()?.to_public()?;
    let derived = PeerId::from_public_key(&public);
    if derived != *claimed {
        return Err(Error::IdentityMismatch {
            derived,
            claimed: claimed.clone(),
        });
    }
    Ok(())
}
