use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fedbroker_common::transport::{DealerSocket, Endpoints, PushSocket};
use fedbroker_common::{BrokerError, Envelope, Result};

/// Burst client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name of the broker whose local frontend this client talks to.
    pub broker: String,
    /// Directory holding the broker's socket files.
    pub runtime_dir: PathBuf,
    /// Upper bound on the idle pause between bursts.
    pub idle_max: Duration,
    /// Upper bound on requests per burst.
    pub burst_max: u32,
    /// How long to wait for each reply before giving the client up as lost.
    pub reply_deadline: Duration,
}

impl ClientConfig {
    /// Creates a configuration targeting the named broker: up to five
    /// seconds idle between bursts of up to fifteen requests, ten seconds
    /// per reply.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            runtime_dir: std::env::temp_dir(),
            idle_max: Duration::from_secs(5),
            burst_max: 15,
            reply_deadline: Duration::from_secs(10),
        }
    }

    /// Sets the runtime directory holding the socket files.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    /// Sets the upper bound on the idle pause between bursts.
    pub fn with_idle_max(mut self, idle_max: Duration) -> Self {
        self.idle_max = idle_max;
        self
    }

    /// Sets the upper bound on requests per burst.
    pub fn with_burst_max(mut self, burst_max: u32) -> Self {
        self.burst_max = burst_max;
        self
    }

    /// Sets the per-reply deadline.
    pub fn with_reply_deadline(mut self, deadline: Duration) -> Self {
        self.reply_deadline = deadline;
        self
    }
}

/// A stub client simulating sporadic activity: sleep a random while, then
/// fire a burst of requests, waiting for each reply in turn.
///
/// Every served reply is reported on the broker's monitor channel. A reply
/// that misses its deadline means the task was lost somewhere in the
/// federation; the client reports the loss and exits, which is the visible
/// symptom an operator watches the monitor channel for.
pub struct BurstClient {
    config: ClientConfig,
    cancel: CancellationToken,
}

impl BurstClient {
    /// Creates a client that stops when the token is cancelled.
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Connects to the broker's local frontend and generates load until
    /// cancelled or a task is lost.
    pub async fn run(self) -> Result<()> {
        let endpoints = Endpoints::new(&self.config.runtime_dir);
        let mut socket = DealerSocket::connect(endpoints.localfe(&self.config.broker));
        let monitor = PushSocket::connect(endpoints.monitor(&self.config.broker));

        loop {
            let idle_ms = rand::thread_rng().gen_range(0..=self.config.idle_max.as_millis() as u64);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_millis(idle_ms)) => {}
            }

            let burst = rand::thread_rng().gen_range(0..self.config.burst_max.max(1));
            debug!("sending burst of {}", burst);
            for _ in 0..burst {
                let task_id = format!("{:04X}", rand::thread_rng().gen_range(0..0x10000));
                socket.send(Envelope::from_body(task_id.clone()))?;

                let reply = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(()),
                    result = tokio::time::timeout(self.config.reply_deadline, socket.recv()) => result,
                };
                let reply = match reply {
                    Ok(reply) => reply?,
                    Err(_) => {
                        let _ = monitor.send(Envelope::from_body(format!(
                            "E: CLIENT EXIT - lost task {}",
                            task_id
                        )));
                        return Err(BrokerError::Timeout(
                            self.config.reply_deadline.as_millis() as u64,
                        ));
                    }
                };

                // The worker answers with our own task id.
                let body = reply.body().cloned().unwrap_or_default();
                if body.as_ref() != task_id.as_bytes() {
                    return Err(BrokerError::MalformedMessage(format!(
                        "reply {:?} does not match task {}",
                        body, task_id
                    )));
                }
                monitor.send(Envelope::from_body(body))?;
            }
        }
    }
}
