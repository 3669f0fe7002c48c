//! Resolving multiaddresses to dialable socket endpoints.
//!
//! A multiaddress is a `/`-delimited sequence of protocol/value segment
//! pairs. Peers advertise these, which makes them best-effort data: a
//! segment that fails to parse is skipped rather than failing the whole
//! address, and at most one endpoint is produced per address string.

use std::collections::HashSet;
use std::net::IpAddr;

/// The transport protocols an endpoint can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

/// A concrete socket endpoint extracted from a multiaddress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub transport: Transport,
    pub port: u16,
}

/// Resolves one multiaddress string to at most one endpoint.
///
/// Walks the segments left to right, accumulating an address literal and a
/// transport/port pair:
///
/// - `ip4`/`ip6` set the address; an unparseable literal clears it but the
///   scan continues.
/// - `tcp`/`udp` set the transport and port; an out-of-range or unparseable
///   port clears them.
/// - `p2p`/`ipfs` annotate the address with a peer identity; the value is
///   consumed and ignored.
/// - Any other token (a relay circuit marker, say) devalues what was
///   accumulated so far: both slots are reset and the scan continues, so a
///   direct hop appearing after the marker can still resolve.
///
/// An endpoint is produced only when both slots are set once all segments
/// are consumed.
pub fn resolve(multiaddr: &str) -> Option<Endpoint> {
    let mut parts = multiaddr.split('/');
    if parts.next() != Some("") {
        return None;
    }

    let mut addr: Option<IpAddr> = None;
    let mut transport: Option<(Transport, u16)> = None;

    while let Some(token) = parts.next() {
        match token {
            "ip4" | "ip6" => {
                addr = parts.next().and_then(|value| value.parse().ok());
            }
            "tcp" => {
                transport = parts
                    .next()
                    .and_then(|value| value.parse().ok())
                    .map(|port| (Transport::Tcp, port));
            }
            "udp" => {
                transport = parts
                    .next()
                    .and_then(|value| value.parse().ok())
                    .map(|port| (Transport::Udp, port));
            }
            "p2p" | "ipfs" => {
                parts.next();
            }
            _ => {
                addr = None;
                transport = None;
            }
        }
    }

    match (addr, transport) {
        (Some(addr), Some((transport, port))) => Some(Endpoint {
            addr,
            transport,
            port,
        }),
        _ => None,
    }
}

/// Resolves each multiaddress independently and collects the results;
/// duplicate endpoints across address strings collapse to one.
pub fn resolve_all<'a, I>(multiaddrs: I) -> HashSet<Endpoint>
where
    I: IntoIterator<Item = &'a str>,
{
    multiaddrs.into_iter().filter_map(resolve).collect()
}
