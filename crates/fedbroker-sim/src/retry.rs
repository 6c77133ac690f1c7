use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{info, warn};

use fedbroker_common::transport::DealerSocket;
use fedbroker_common::{BrokerError, Envelope, Result};

/// Bounded-retry configuration: a fixed attempt budget with a fixed
/// per-attempt timeout. No backoff; the recovery action is reconnecting,
/// not waiting longer.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts before the request is abandoned.
    ///
    /// Default: 3
    pub attempts: u32,
    /// How long each attempt waits for a reply.
    ///
    /// Default: 2500ms
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            request_timeout: Duration::from_millis(2500),
        }
    }
}

impl RetryConfig {
    /// Sets the total attempt budget.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the per-attempt reply timeout.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// A request client that survives unreliable servers.
///
/// Each attempt sends the request and waits one timeout for the reply. On
/// expiry the connection is torn down and recreated before resending, since
/// the old one may still deliver a stale reply out of step with the next
/// attempt. After the attempt budget is spent the request fails.
///
/// The broker deliberately contains no retry of its own; this is where
/// reliability against lost requests lives.
pub struct RetryClient {
    endpoint: PathBuf,
    config: RetryConfig,
}

impl RetryClient {
    /// Creates a client for the given request endpoint with default retry
    /// settings.
    pub fn new(endpoint: impl AsRef<Path>) -> Self {
        Self {
            endpoint: endpoint.as_ref().to_path_buf(),
            config: RetryConfig::default(),
        }
    }

    /// Replaces the retry settings.
    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sends one request and returns the reply, retrying within the
    /// configured budget.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Timeout`] once every attempt has expired
    /// without a reply.
    pub async fn request(&self, body: impl Into<Bytes>) -> Result<Envelope> {
        let body = body.into();
        let mut socket = DealerSocket::connect(&self.endpoint);
        let mut attempts_left = self.config.attempts;

        loop {
            socket.send(Envelope::from_frames(vec![body.clone()]))?;

            match timeout(self.config.request_timeout, socket.recv()).await {
                Ok(reply) => return reply,
                Err(_) => {
                    attempts_left = attempts_left.saturating_sub(1);
                    if attempts_left == 0 {
                        warn!("server seems to be offline, abandoning");
                        return Err(BrokerError::Timeout(
                            self.config.request_timeout.as_millis() as u64,
                        ));
                    }
                    warn!("no response, retrying");
                    // The old connection may be wedged mid-exchange; close
                    // it and open a fresh one before resending.
                    info!("reconnecting to {:?}", self.endpoint);
                    socket = DealerSocket::connect(&self.endpoint);
                }
            }
        }
    }
}
