//! Client library for kubo-compatible content-addressed storage daemons.
//!
//! Beyond the thin HTTP plumbing in [`Client`], this crate carries the
//! trust-sensitive pieces of talking to a remote daemon: decoding and
//! verifying the daemon's cryptographic identity ([`keys`], [`identity`]),
//! resolving advertised multiaddresses into dialable endpoints ([`addr`]),
//! and consuming the streaming provider discovery protocol ([`providers`]).

pub mod addr;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod keys;
pub mod providers;

pub use crate::addr::{resolve, resolve_all, Endpoint, Transport};
pub use crate::client::{Client, Peer, DEFAULT_API_URL, DEFAULT_PROVIDER_LIMIT};
pub use crate::config::read_private_key;
pub use crate::error::{Error, Result};
pub use crate::identity::{verify_private_key, PeerId};
pub use crate::keys::{
    Ed25519KeyMaterial, KeyMaterial, KeyType, PrivateKey, PublicKey, RsaKeyMaterial,
};
pub use crate::providers::{provider_stream, DiscoveredPeer};
pub use cid::Cid;
