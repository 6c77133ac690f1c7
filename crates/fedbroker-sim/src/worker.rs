use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fedbroker_common::protocol::ready_envelope;
use fedbroker_common::transport::{DealerSocket, Endpoints};
use fedbroker_common::Result;

/// Echo worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the broker whose local backend this worker plugs into.
    pub broker: String,
    /// Directory holding the broker's socket files.
    pub runtime_dir: PathBuf,
    /// Upper bound on the simulated busy time per job.
    pub busy_max: Duration,
}

impl WorkerConfig {
    /// Creates a configuration targeting the named broker, defaulting to the
    /// system temp directory and up to one second of busy time per job.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            runtime_dir: std::env::temp_dir(),
            busy_max: Duration::from_millis(1000),
        }
    }

    /// Sets the runtime directory holding the socket files.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    /// Sets the upper bound on simulated busy time.
    pub fn with_busy_max(mut self, busy_max: Duration) -> Self {
        self.busy_max = busy_max;
        self
    }
}

/// A stub worker: announces READY, then echoes each job back after a random
/// busy delay, leaving the address stack untouched so the reply retraces the
/// request's route.
pub struct EchoWorker {
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl EchoWorker {
    /// Creates a worker that stops when the token is cancelled.
    pub fn new(config: WorkerConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Connects to the broker's local backend and serves until cancelled.
    pub async fn run(self) -> Result<()> {
        let endpoints = Endpoints::new(&self.config.runtime_dir);
        let mut socket = DealerSocket::connect(endpoints.localbe(&self.config.broker));

        // Tell the broker we're ready for work.
        socket.send(ready_envelope())?;

        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                result = socket.recv() => result?,
            };

            let busy_ms = rand::thread_rng().gen_range(0..=self.config.busy_max.as_millis() as u64);
            debug!("working for {}ms", busy_ms);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_millis(busy_ms)) => {}
            }

            socket.send(job)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedbroker_common::protocol::is_ready;
    use fedbroker_common::transport::RouterSocket;
    use fedbroker_common::Envelope;
    use tokio::time::timeout;

    #[test]
    fn test_worker_config_defaults() {
        let config = WorkerConfig::new("alpha");
        assert_eq!(config.broker, "alpha");
        assert_eq!(config.busy_max, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_worker_announces_ready_then_echoes() {
        let dir = tempfile::TempDir::new().unwrap();
        let endpoints = Endpoints::new(dir.path());
        let mut backend = RouterSocket::bind(endpoints.localbe("alpha")).await.unwrap();

        let cancel = CancellationToken::new();
        let config = WorkerConfig::new("alpha")
            .with_runtime_dir(dir.path())
            .with_busy_max(Duration::ZERO);
        let handle = tokio::spawn(EchoWorker::new(config, cancel.clone()).run());

        let deadline = Duration::from_secs(2);
        let announcement = timeout(deadline, backend.recv()).await.unwrap().unwrap();
        let (identity, payload) = announcement.pop_address().unwrap();
        assert!(is_ready(&payload));

        backend
            .send(Envelope::from_body("job").push_address("client-1").push_address(identity))
            .unwrap();
        let echoed = timeout(deadline, backend.recv()).await.unwrap().unwrap();
        // Identity back on top, address stack intact underneath.
        let (_, reply) = echoed.pop_address().unwrap();
        assert_eq!(reply.first().unwrap().as_ref(), b"client-1");
        assert_eq!(reply.body().unwrap().as_ref(), b"job");

        cancel.cancel();
        timeout(deadline, handle).await.unwrap().unwrap().unwrap();
    }
}
