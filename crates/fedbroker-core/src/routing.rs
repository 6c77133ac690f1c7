//! Placement and destination decisions, kept separate from the socket work
//! so they can be tested without a transport.

use rand::seq::SliceRandom;

use fedbroker_common::Envelope;

/// Where a routed reply should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDestination {
    /// To a client of this node, via the local frontend.
    Local,
    /// Back to the peer broker the work was borrowed from, via the cloud
    /// frontend.
    Cloud,
}

/// Decides where a reply belongs by comparing its leading address frame
/// byte-for-byte against the configured peer names.
///
/// Replies can answer either genuinely local clients or requests this node
/// previously borrowed from a peer, which is why both checks exist. An
/// address that matches no peer is treated as a local client address; the
/// broker fails open toward local delivery rather than dropping.
pub fn reply_destination(reply: &Envelope, peers: &[String]) -> ReplyDestination {
    match reply.first() {
        Some(address) if peers.iter().any(|peer| peer.as_bytes() == address.as_ref()) => {
            ReplyDestination::Cloud
        }
        _ => ReplyDestination::Local,
    }
}

/// Picks a peer uniformly at random for overflow placement.
///
/// Selection is deliberately not weighted by last-known per-peer capacity;
/// the gossip keeps only an aggregate estimate, so there is nothing to
/// weight by. Returns `None` when no peers are configured.
pub fn choose_peer(peers: &[String]) -> Option<&str> {
    peers.choose(&mut rand::thread_rng()).map(String::as_str)
}
