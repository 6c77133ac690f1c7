/// Message counters kept by a broker over its lifetime.
///
/// Returned from [`Broker::run`](crate::Broker::run) and logged at shutdown,
/// so tests and operators can see where the traffic went.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    /// READY announcements consumed from the local backend.
    pub ready_signals: u64,
    /// Requests admitted from the local frontend.
    pub local_requests: u64,
    /// Requests admitted from peer brokers via the cloud frontend.
    pub cloud_requests: u64,
    /// Requests forwarded to a peer because no local worker was idle.
    pub overflowed: u64,
    /// Replies routed to local clients.
    pub local_replies: u64,
    /// Replies routed back to peer brokers.
    pub cloud_replies: u64,
    /// Capacity beacons ingested from peers.
    pub beacons_received: u64,
    /// Capacity beacons broadcast by this node.
    pub beacons_sent: u64,
}

impl BrokerStats {
    /// Total requests this broker admitted from either frontend.
    pub fn requests_admitted(&self) -> u64 {
        self.local_requests + self.cloud_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = BrokerStats::default();
        assert_eq!(stats.requests_admitted(), 0);
        assert_eq!(stats.beacons_sent, 0);
    }

    #[test]
    fn test_requests_admitted_sums_both_frontends() {
        let stats = BrokerStats {
            local_requests: 3,
            cloud_requests: 2,
            ..Default::default()
        };
        assert_eq!(stats.requests_admitted(), 5);
    }
}
