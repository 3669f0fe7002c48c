//! Reading the daemon's repo configuration.
//!
//! The daemon keeps its identity in the repo's `config` file, a JSON
//! document whose `Identity.PrivKey` field holds the base64 encoded
//! private key envelope. Loading it locally is what makes
//! [`Client::verify_daemon`](crate::Client::verify_daemon) possible.

use std::path::{Path, PathBuf};

use data_encoding::BASE64;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys::PrivateKey;

/// Overrides the default repo location when set.
pub const ENV_IPFS_PATH: &str = "IPFS_PATH";

const DEFAULT_REPO_DIR: &str = ".ipfs";
const REPO_CONFIG_FILE: &str = "config";

#[derive(Debug, Deserialize)]
struct RepoConfig {
    #[serde(rename = "Identity")]
    identity: IdentityConfig,
}

#[derive(Debug, Deserialize)]
struct IdentityConfig {
    #[serde(rename = "PrivKey", default)]
    priv_key: String,
}

/// The repo directory to read: `$IPFS_PATH` when set, `~/.ipfs` otherwise.
pub fn repo_root() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_IPFS_PATH) {
        return Ok(PathBuf::from(path));
    }
    dirs_next::home_dir()
        .map(|home| home.join(DEFAULT_REPO_DIR))
        .ok_or_else(|| Error::Config("cannot determine the home directory".into()))
}

/// Reads the daemon's private key envelope from its repo configuration.
///
/// `repo` overrides the default repo location from [`repo_root`].
pub async fn read_private_key(repo: Option<&Path>) -> Result<PrivateKey> {
    let root = match repo {
        Some(path) => path.to_path_buf(),
        None => repo_root()?,
    };
    let path = root.join(REPO_CONFIG_FILE);
    debug!("reading daemon private key from {}", path.display());

    let raw = fs::read_to_string(&path).await?;
    let config: RepoConfig = serde_json::from_str(&raw)?;
    let bytes = BASE64
        .decode(config.identity.priv_key.as_bytes())
        .map_err(|e| Error::Config(format!("Identity.PrivKey is not valid base64: {e}")))?;
    PrivateKey::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use crate::keys::KeyType;

    use super::*;

    #[tokio::test]
    async fn reads_private_key_from_repo_config() {
        let key = PrivateKey::new(KeyType::Ed25519, vec![42; 64]);
        let config = serde_json::json!({
            "Identity": {
                "PeerID": "QmPeer",
                "PrivKey": BASE64.encode(&key.to_bytes()),
            },
            "Datastore": {},
        });

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config"),
            serde_json::to_vec(&config).unwrap(),
        )
        .await
        .unwrap();

        let read = read_private_key(Some(dir.path())).await.unwrap();
        assert_eq!(read, key);
    }

    #[tokio::test]
    async fn missing_priv_key_fails_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config"), br#"{"Identity":{}}"#)
            .await
            .unwrap();

        // empty PrivKey decodes to zero bytes, which is not an envelope
        let err = read_private_key(Some(dir.path())).await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
