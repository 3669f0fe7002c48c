//! The streaming provider discovery protocol.
//!
//! A provider query against the daemon answers with a live stream of
//! newline-delimited JSON routing events. Only the direct provider-found
//! events contribute peers; everything else, including lines that fail to
//! parse at all, is skipped. The stream is lazy and single pass: peers are
//! produced as lines arrive, reading stops as soon as the requested number
//! of peers was yielded, and dropping the stream drops the underlying
//! source no matter how enumeration ended.

use std::collections::HashSet;

use async_stream::try_stream;
use futures::Stream;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::error::Result;
use crate::identity::PeerId;

/// A peer advertising that it holds the queried content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredPeer {
    pub id: PeerId,
}

/// The routing event type marking a direct provider answer. Other type
/// codes (referrals, progress markers) carry no providers for us.
const PROVIDER_EVENT: i64 = 4;

#[derive(Debug, Deserialize)]
struct RoutingEvent {
    #[serde(rename = "Type")]
    event_type: i64,
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Responses", default)]
    responses: Vec<RoutingResponse>,
}

#[derive(Debug, Deserialize)]
struct RoutingResponse {
    #[serde(rename = "ID", default)]
    id: String,
}

/// Lazily parses a line source of routing events into a deduplicated,
/// ordered stream of at most `limit` providers.
///
/// `on_found` fires synchronously for every peer, immediately before the
/// peer is yielded to the consumer. I/O failures on the source terminate
/// the stream with an error; a single malformed line merely gets skipped.
/// The caller stops consumption by dropping the stream, which releases the
/// source.
pub fn provider_stream<R, F>(
    reader: R,
    limit: usize,
    mut on_found: F,
) -> impl Stream<Item = Result<DiscoveredPeer>>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&DiscoveredPeer),
{
    try_stream! {
        let mut lines = reader.lines();
        let mut seen: HashSet<PeerId> = HashSet::new();
        let mut found = 0;

        while found < limit {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let event: RoutingEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(err) => {
                    debug!("skipping unparseable routing event: {err}");
                    continue;
                }
            };
            if event.event_type != PROVIDER_EVENT {
                continue;
            }

            if !event.id.is_empty() {
                if let Some(peer) = discovered_peer(&event.id) {
                    if seen.insert(peer.id.clone()) {
                        found += 1;
                        on_found(&peer);
                        yield peer;
                    }
                }
            } else {
                for response in &event.responses {
                    if found >= limit {
                        break;
                    }
                    if response.id.is_empty() {
                        continue;
                    }
                    if let Some(peer) = discovered_peer(&response.id) {
                        if seen.insert(peer.id.clone()) {
                            found += 1;
                            on_found(&peer);
                            yield peer;
                        }
                    }
                }
            }
        }
    }
}

fn discovered_peer(id: &str) -> Option<DiscoveredPeer> {
    match id.parse() {
        Ok(id) => Some(DiscoveredPeer { id }),
        Err(err) => {
            warn!("skipping provider with undecodable peer id {id:?}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::io::{AsyncWriteExt, BufReader};

    use super::*;

    async fn collect(input: &str, limit: usize) -> Vec<String> {
        provider_stream(input.as_bytes(), limit, |_| {})
            .map(|peer| peer.unwrap().id.to_string())
            .collect()
            .await
    }

    #[tokio::test]
    async fn yields_direct_providers_up_to_limit() {
        let input = concat!(
            r#"{"Type":4,"ID":"QmA"}"#,
            "\n",
            r#"{"Type":1,"ID":"QmIgnored"}"#,
            "\n",
            r#"{"Type":4,"ID":"QmB"}"#,
            "\n",
        );
        assert_eq!(collect(input, 1).await, vec!["QmA"]);
        assert_eq!(collect(input, 10).await, vec!["QmA", "QmB"]);
    }

    #[tokio::test]
    async fn fans_out_over_responses() {
        let input = concat!(
            r#"{"Type":4,"ID":"","Responses":[{"ID":"QmX"},{"ID":""}]}"#,
            "\n",
        );
        assert_eq!(collect(input, 10).await, vec!["QmX"]);
    }

    #[tokio::test]
    async fn limit_applies_inside_responses() {
        let input = concat!(
            r#"{"Type":4,"ID":"","Responses":[{"ID":"QmX"},{"ID":"QmY"},{"ID":"QmZ"}]}"#,
            "\n",
        );
        assert_eq!(collect(input, 2).await, vec!["QmX", "QmY"]);
    }

    #[tokio::test]
    async fn skips_malformed_lines_and_duplicates() {
        let input = concat!(
            "not json at all\n",
            r#"{"Type":4,"ID":"QmA"}"#,
            "\n",
            r#"{"Unrelated":true}"#,
            "\n",
            r#"{"Type":4,"ID":"QmA"}"#,
            "\n",
            r#"{"Type":4,"ID":"QmB"}"#,
            "\n",
        );
        assert_eq!(collect(input, 10).await, vec!["QmA", "QmB"]);
    }

    #[tokio::test]
    async fn callback_fires_in_order_before_yield() {
        let input = concat!(
            r#"{"Type":4,"ID":"QmA"}"#,
            "\n",
            r#"{"Type":4,"ID":"QmB"}"#,
            "\n",
        );
        let mut callback_order = Vec::new();
        let peers: Vec<_> = provider_stream(input.as_bytes(), 10, |peer| {
            callback_order.push(peer.id.to_string());
        })
        .map(|peer| peer.unwrap().id.to_string())
        .collect()
        .await;
        assert_eq!(peers, vec!["QmA", "QmB"]);
        assert_eq!(callback_order, peers);
    }

    #[tokio::test]
    async fn stops_reading_once_limit_is_reached() {
        // the writer stays open; the stream must still complete after one
        // peer because it never asks for a second line
        let (reader, mut writer) = tokio::io::duplex(256);
        writer
            .write_all(b"{\"Type\":4,\"ID\":\"QmA\"}\n")
            .await
            .unwrap();

        let stream = provider_stream(BufReader::new(reader), 1, |_| {});
        let peers: Vec<_> = tokio::time::timeout(Duration::from_secs(1), stream.collect::<Vec<_>>())
            .await
            .expect("stream did not terminate at the limit");
        assert_eq!(peers.len(), 1);
        drop(writer);
    }

    #[tokio::test]
    async fn zero_limit_reads_nothing() {
        let input = r#"{"Type":4,"ID":"QmA"}"#;
        assert!(collect(input, 0).await.is_empty());
    }
}
