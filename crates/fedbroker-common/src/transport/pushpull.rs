use std::path::Path;

use bytes::Bytes;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::Envelope;
use crate::protocol::error::{BrokerError, Result};
use crate::transport::conn;

/// A dialing send-only socket, used by simulator tasks to push printable
/// status lines at a broker's monitor channel.
pub struct PushSocket {
    outbound: mpsc::UnboundedSender<Envelope>,
    shutdown: CancellationToken,
}

impl PushSocket {
    /// Starts dialing the given collection endpoint in the background.
    pub fn connect(path: impl AsRef<Path>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        conn::spawn_connector(
            path.as_ref().to_path_buf(),
            Bytes::new(),
            None,
            Some(outbound_rx),
            shutdown.child_token(),
        );
        Self { outbound, shutdown }
    }

    /// Queues an envelope for delivery.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound
            .send(envelope)
            .map_err(|_| BrokerError::ConnectionClosed)
    }
}

impl Drop for PushSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A bound receive-only socket merging all connected pushers into one queue.
pub struct PullSocket {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    shutdown: CancellationToken,
}

impl PullSocket {
    /// Binds a pull socket to the given path, replacing any stale socket
    /// file left by a previous run.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|e| {
            BrokerError::Transport(format!("failed to bind {:?}: {}", path, e))
        })?;

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let accept_cancel = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = accept_cancel.cancelled() => return,
                    result = listener.accept() => result,
                };
                let mut stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        debug!("accept on {:?} failed: {}", path, e);
                        return;
                    }
                };
                let inbound_tx = inbound_tx.clone();
                let cancel = accept_cancel.clone();
                tokio::spawn(async move {
                    if conn::read_greeting(&mut stream).await.is_err() {
                        return;
                    }
                    let (read_half, _write_half) = stream.into_split();
                    conn::read_loop(read_half, inbound_tx, None, cancel).await;
                });
            }
        });

        Ok(Self { inbound, shutdown })
    }

    /// Waits for the next pushed envelope. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Envelope> {
        self.inbound.recv().await.ok_or(BrokerError::ConnectionClosed)
    }

    /// Returns the next queued envelope without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Envelope>> {
        match self.inbound.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(BrokerError::ConnectionClosed),
        }
    }
}

impl Drop for PullSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
