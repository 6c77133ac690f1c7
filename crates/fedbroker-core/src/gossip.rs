use tracing::{debug, warn};

use fedbroker_common::transport::PubSocket;
use fedbroker_common::{Envelope, Result, StateMessage};

/// Capacity gossip: beacons in from peers, beacons out to peers.
///
/// Every peer's last broadcast overwrites a single aggregate `cloud_capacity`
/// estimate; the design deliberately keeps no per-peer bookkeeping. Outbound
/// beacons are edge-triggered: the broker broadcasts only on ticks where its
/// own idle-worker count changed, never on a periodic heartbeat. The cost of
/// that economy is that a newly-joined peer sees no capacity until the next
/// change.
#[derive(Debug)]
pub struct CapacityGossip {
    self_name: String,
    cloud_capacity: u32,
}

impl CapacityGossip {
    /// Creates gossip state for the named node, starting with zero known
    /// cloud capacity.
    pub fn new(self_name: impl Into<String>) -> Self {
        Self {
            self_name: self_name.into(),
            cloud_capacity: 0,
        }
    }

    /// Last-advertised idle-worker count of the peers, as a single
    /// aggregate.
    pub fn cloud_capacity(&self) -> u32 {
        self.cloud_capacity
    }

    /// Ingests a beacon received on the state channel, overwriting the
    /// aggregate estimate.
    ///
    /// A malformed beacon is logged and ignored; a broken peer must not take
    /// this node down. Returns whether the beacon was accepted.
    pub fn ingest(&mut self, envelope: Envelope) -> bool {
        match StateMessage::decode(&envelope) {
            Ok(beacon) => {
                debug!(peer = %beacon.peer, capacity = beacon.capacity, "capacity beacon");
                self.cloud_capacity = beacon.capacity;
                true
            }
            Err(e) => {
                warn!("ignoring malformed state beacon: {}", e);
                false
            }
        }
    }

    /// Broadcasts this node's current idle-worker count to all subscribed
    /// peers.
    pub fn broadcast(&self, statebe: &PubSocket, capacity: usize) -> Result<()> {
        let beacon = StateMessage::new(self.self_name.clone(), capacity as u32);
        statebe.send(beacon.encode())
    }
}
