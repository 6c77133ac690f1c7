use std::path::PathBuf;
use std::time::Duration;

/// Interval at which a broker with idle workers re-enters its readiness wait
/// even when nothing arrives, so the local/cloud mix is re-evaluated without
/// busy-polling.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(1000);

/// Broker configuration.
///
/// The peer set is fixed at startup: peers are named, and every name is
/// resolved to endpoints inside the shared runtime directory.
///
/// # Example
///
/// ```
/// use fedbroker_core::BrokerConfig;
///
/// let config = BrokerConfig::new("broker-a")
///     .with_peers(vec!["broker-b".to_string(), "broker-c".to_string()])
///     .with_runtime_dir("/run/fedbroker");
/// assert_eq!(config.peers.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// This node's own name; peers reach it through name-derived endpoints.
    pub name: String,
    /// Names of the other brokers in the federation. May be empty, in which
    /// case the broker never overflows.
    pub peers: Vec<String>,
    /// Directory holding every node's socket files.
    ///
    /// Defaults to the system temp directory.
    pub runtime_dir: PathBuf,
    /// Readiness-wait timeout used while idle workers are available.
    ///
    /// With zero idle workers the broker waits indefinitely instead; new
    /// requests are left queued in the transport until capacity returns.
    /// Defaults to [`DEFAULT_HEARTBEAT`].
    pub heartbeat: Duration,
}

impl BrokerConfig {
    /// Creates a configuration with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peers: Vec::new(),
            runtime_dir: std::env::temp_dir(),
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    /// Sets the static peer list.
    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }

    /// Sets the runtime directory holding the socket files.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    /// Sets the idle-capacity readiness-wait timeout.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}
