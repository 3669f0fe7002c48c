use thiserror::Error;

use crate::identity::PeerId;
use crate::keys::KeyType;

/// Errors produced by this crate.
///
/// Key and identity failures are hard errors: they indicate corrupted or
/// hostile trust material and callers must stop. Per-entry parse failures in
/// network-advertised data (multiaddresses, discovery events) are never
/// surfaced here; those entries are skipped and processing continues.
#[derive(Debug, Error)]
pub enum Error {
    /// The bytes do not match the two-field key envelope layout.
    #[error("invalid key envelope: {0}")]
    Format(String),
    /// The envelope payload does not have the shape the algorithm requires.
    #[error("malformed {algorithm} key: {reason}")]
    MalformedKey { algorithm: KeyType, reason: String },
    /// The algorithm is representable but has no extraction rule.
    #[error("no key material extraction for {0} keys")]
    UnsupportedKeyType(KeyType),
    /// The identity derived from the private key does not match the identity
    /// the daemon reports. Treat as a trust failure, never retry.
    #[error("peer identity mismatch: key derives {derived}, daemon claims {claimed}")]
    IdentityMismatch { derived: PeerId, claimed: PeerId },
    #[error("invalid peer id: {0}")]
    PeerId(#[from] bs58::decode::Error),
    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request to daemon failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error parsing json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid repo config: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
