use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::Envelope;
use crate::protocol::error::{BrokerError, Result};
use crate::transport::conn;

type SubscriberTable = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Envelope>>>>;

/// A bound publish socket: every envelope sent is fanned out to all
/// currently-connected subscribers.
///
/// Publishing is best-effort; a subscriber that is not yet connected simply
/// misses the message, which is why capacity gossip overwrites rather than
/// accumulates on the receiving side.
pub struct PubSocket {
    subscribers: SubscriberTable,
    shutdown: CancellationToken,
}

impl PubSocket {
    /// Binds a publish socket to the given path, replacing any stale socket
    /// file left by a previous run.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|e| {
            BrokerError::Transport(format!("failed to bind {:?}: {}", path, e))
        })?;

        let subscribers: SubscriberTable = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let accept_subscribers = subscribers.clone();
        let accept_cancel = shutdown.clone();
        tokio::spawn(async move {
            let mut serial: u64 = 0;
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
                serial += 1;
                let id = serial;
                let subscribers = accept_subscribers.clone();
                let cancel = accept_cancel.clone();
                tokio::spawn(async move {
                    if conn::read_greeting(&mut stream).await.is_err() {
                        return;
                    }
                    let (_read_half, write_half) = stream.into_split();
                    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                    subscribers
                        .lock()
                        .expect("subscriber table poisoned")
                        .insert(id, outbound_tx);
                    conn::write_loop(write_half, outbound_rx, cancel).await;
                    subscribers
                        .lock()
                        .expect("subscriber table poisoned")
                        .remove(&id);
                });
            }
        });

        Ok(Self {
            subscribers,
            shutdown,
        })
    }

    /// Fans the envelope out to every connected subscriber.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        let subscribers = self.subscribers.lock().expect("subscriber table poisoned");
        for outbound in subscribers.values() {
            // A failed send means the subscriber's writer already exited; it
            // unregisters itself, so just skip it here.
            let _ = outbound.send(envelope.clone());
        }
        Ok(())
    }

    /// Number of currently-connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber table poisoned")
            .len()
    }
}

impl Drop for PubSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A subscribe socket that dials one or more publishers and merges their
/// streams into a single inbound queue.
pub struct SubSocket {
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    shutdown: CancellationToken,
}

impl SubSocket {
    /// Creates a subscriber with no connections yet.
    pub fn new() -> Self {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound,
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts dialing a publisher endpoint in the background. May be called
    /// once per publisher.
    pub fn connect(&mut self, path: PathBuf) {
        conn::spawn_connector(
            path,
            Bytes::new(),
            Some((self.inbound_tx.clone(), None)),
            None,
            self.shutdown.child_token(),
        );
    }

    /// Waits for the next published envelope. Cancel-safe.
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

impl Default for SubSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
