//! HTTP client for the daemon's RPC API.
//!
//! A thin transport: build the query string, POST, parse the reply. The
//! calls exposed here are the ones the identity and address subsystems
//! need; the daemon's remaining API surfaces are out of scope.

use std::collections::HashSet;
use std::io;

use cid::Cid;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

use crate::addr::{self, Endpoint};
use crate::error::Result;
use crate::identity::{verify_private_key, PeerId};
use crate::keys::PrivateKey;
use crate::providers::{provider_stream, DiscoveredPeer};

/// Where a locally running daemon listens by default.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

/// Default number of providers to ask for.
pub const DEFAULT_PROVIDER_LIMIT: usize = 20;

/// A peer as reported by the daemon.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    /// Advertised multiaddresses, verbatim; feed through
    /// [`addr::resolve_all`] to obtain dialable endpoints.
    pub addresses: Vec<String>,
    pub agent_version: Option<String>,
    pub protocol_version: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct IdReply {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Addresses", default)]
    addresses: Vec<String>,
    #[serde(rename = "AgentVersion")]
    agent_version: Option<String>,
    #[serde(rename = "ProtocolVersion")]
    protocol_version: Option<String>,
}

/// Client for a kubo-compatible daemon RPC endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
}

impl Client {
    /// Creates a client against the given API base url,
    /// e.g. [`DEFAULT_API_URL`].
    pub fn new(api_url: &str) -> Result<Self> {
        Ok(Client {
            http: reqwest::Client::new(),
            base: Url::parse(api_url)?,
        })
    }

    fn api_url(&self, command: &str) -> Result<Url> {
        Ok(self.base.join(&format!("api/v0/{command}"))?)
    }

    /// Queries the daemon for information about a peer, or about the
    /// daemon itself when `peer` is `None`.
    pub async fn id(&self, peer: Option<&PeerId>) -> Result<Peer> {
        let mut url = self.api_url("id")?;
        if let Some(peer) = peer {
            url.query_pairs_mut().append_pair("arg", &peer.to_string());
        }
        debug!(%url, "id query");
        let reply: IdReply = self
            .http
            .post(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Peer {
            id: reply.id.parse()?,
            addresses: reply.addresses,
            agent_version: reply.agent_version,
            protocol_version: reply.protocol_version,
        })
    }

    /// Confirms the daemon behind this client holds `key`.
    ///
    /// Fails with [`crate::Error::IdentityMismatch`] when the daemon
    /// reports an identity the key cannot produce, e.g. because the
    /// endpoint was swapped for a different node.
    pub async fn verify_daemon(&self, key: &PrivateKey) -> Result<()> {
        let myself = self.id(None).await?;
        verify_private_key(key, &myself.id)
    }

    /// Looks a peer up and resolves its advertised multiaddresses into
    /// dialable endpoints.
    pub async fn find_peer_addresses(&self, peer: &PeerId) -> Result<HashSet<Endpoint>> {
        let peer = self.id(Some(peer)).await?;
        Ok(addr::resolve_all(peer.addresses.iter().map(String::as_str)))
    }

    /// Asks the DHT for peers providing `cid`, streaming them as the
    /// daemon reports them.
    ///
    /// At most `limit` providers are produced and `on_found` fires for
    /// each before it is yielded. Dropping the stream aborts the query.
    pub async fn find_providers<F>(
        &self,
        cid: &Cid,
        limit: usize,
        on_found: F,
    ) -> Result<BoxStream<'static, Result<DiscoveredPeer>>>
    where
        F: FnMut(&DiscoveredPeer) + Send + 'static,
    {
        let mut url = self.api_url("routing/findprovs")?;
        url.query_pairs_mut()
            .append_pair("arg", &cid.to_string())
            .append_pair("num-providers", &limit.to_string());
        debug!(%url, "provider query");
        let response = self.http.post(url).send().await?.error_for_status()?;
        let reader = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        Ok(provider_stream(reader, limit, on_found).boxed())
    }
}
