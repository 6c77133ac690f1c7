use std::path::Path;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::envelope::Envelope;
use crate::protocol::error::{BrokerError, Result};
use crate::transport::conn;

/// An anonymous dialing socket, used by workers and clients to plug into a
/// broker's [`RouterSocket`](crate::transport::RouterSocket).
///
/// The dealer sends an empty greeting; the router assigns the connection a
/// unique identity and uses it as the return address for replies. Sends are
/// fire-and-forget and buffered until the router binds, so a stub process may
/// start before its broker.
pub struct DealerSocket {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    outbound: mpsc::UnboundedSender<Envelope>,
    shutdown: CancellationToken,
}

impl DealerSocket {
    /// Starts dialing the given endpoint in the background.
    pub fn connect(path: impl AsRef<Path>) -> Self {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        conn::spawn_connector(
            path.as_ref().to_path_buf(),
            Bytes::new(),
            Some((inbound_tx, None)),
            Some(outbound_rx),
            shutdown.child_token(),
        );
        Self {
            inbound,
            outbound,
            shutdown,
        }
    }

    /// Waits for the next inbound envelope. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Envelope> {
        self.inbound.recv().await.ok_or(BrokerError::ConnectionClosed)
    }

    /// Returns the next queued inbound envelope without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Envelope>> {
        match self.inbound.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(BrokerError::ConnectionClosed),
        }
    }

    /// Queues an envelope for delivery.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound
            .send(envelope)
            .map_err(|_| BrokerError::ConnectionClosed)
    }
}

impl Drop for DealerSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
