use std::path::PathBuf;

/// Derives socket paths from node names.
///
/// Every node exposes its channels as Unix domain sockets inside a shared
/// runtime directory, keyed by node name: `<dir>/<name>-<channel>.sock`.
/// A broker binds its own five channels and connects outbound to each peer's
/// `cloud` and `state` endpoints, so any two nodes that agree on the runtime
/// directory can find each other by name alone.
#[derive(Debug, Clone)]
pub struct Endpoints {
    dir: PathBuf,
}

impl Endpoints {
    /// Creates an endpoint namer rooted at the given runtime directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The client-facing frontend of `node`.
    pub fn localfe(&self, node: &str) -> PathBuf {
        self.channel(node, "localfe")
    }

    /// The worker-facing backend of `node`.
    pub fn localbe(&self, node: &str) -> PathBuf {
        self.channel(node, "localbe")
    }

    /// The peer-facing request/reply channel of `node`.
    pub fn cloud(&self, node: &str) -> PathBuf {
        self.channel(node, "cloud")
    }

    /// The capacity-beacon publish channel of `node`.
    pub fn state(&self, node: &str) -> PathBuf {
        self.channel(node, "state")
    }

    /// The printable-status collection channel of `node`.
    pub fn monitor(&self, node: &str) -> PathBuf {
        self.channel(node, "monitor")
    }

    fn channel(&self, node: &str, channel: &str) -> PathBuf {
        self.dir.join(format!("{}-{}.sock", node, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths_are_name_derived() {
        let endpoints = Endpoints::new("/run/fedbroker");
        assert_eq!(
            endpoints.localfe("alpha"),
            PathBuf::from("/run/fedbroker/alpha-localfe.sock")
        );
        assert_eq!(
            endpoints.cloud("beta"),
            PathBuf::from("/run/fedbroker/beta-cloud.sock")
        );
        assert_eq!(
            endpoints.state("beta"),
            PathBuf::from("/run/fedbroker/beta-state.sock")
        );
    }

    #[test]
    fn test_distinct_channels_get_distinct_paths() {
        let endpoints = Endpoints::new("/tmp");
        let paths = [
            endpoints.localfe("n"),
            endpoints.localbe("n"),
            endpoints.cloud("n"),
            endpoints.state("n"),
            endpoints.monitor("n"),
        ];
        for (i, a) in paths.iter().enumerate() {
            for b in paths.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
