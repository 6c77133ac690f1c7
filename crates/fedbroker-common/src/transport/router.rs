use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::protocol::error::{BrokerError, Result};
use crate::transport::conn;

type ConnectionTable = Arc<Mutex<HashMap<Bytes, mpsc::UnboundedSender<Envelope>>>>;

/// An identity-routing socket bound to an endpoint.
///
/// Each accepted connection announces an identity in its greeting (anonymous
/// connections are assigned one). Inbound messages arrive with the sender's
/// identity pushed as the leading address frame; outbound messages are routed
/// by popping the leading frame and delivering to the connection registered
/// under it. A reconnect under an existing identity replaces the previous
/// connection, so a client that drops and redials keeps its return address.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> fedbroker_common::Result<()> {
/// use fedbroker_common::transport::{DealerSocket, RouterSocket};
///
/// let mut router = RouterSocket::bind("/tmp/example.sock").await?;
/// let mut dealer = DealerSocket::connect("/tmp/example.sock");
///
/// dealer.send(fedbroker_common::Envelope::from_body("hello"))?;
/// let request = router.recv().await?;      // [identity, "hello"]
/// router.send(request)?;                   // routed back by identity
/// let reply = dealer.recv().await?;        // ["hello"]
/// # Ok(())
/// # }
/// ```
pub struct RouterSocket {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    connections: ConnectionTable,
    shutdown: CancellationToken,
}

impl RouterSocket {
    /// Binds a router to the given socket path, replacing any stale socket
    /// file left by a previous run.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|e| {
            BrokerError::Transport(format!("failed to bind {:?}: {}", path, e))
        })?;

        let connections: ConnectionTable = Arc::new(Mutex::new(HashMap::new()));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let accept_connections = connections.clone();
        let accept_cancel = shutdown.clone();
        tokio::spawn(async move {
            let anonymous = AtomicU64::new(0);
            loop {
                let accepted = tokio::select! {
                    _ = accept_cancel.cancelled() => return,
                    result = listener.accept() => result,
                };
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        debug!("accept on {:?} failed: {}", path, e);
                        return;
                    }
                };
                register_connection(
                    stream,
                    &accept_connections,
                    &inbound_tx,
                    &anonymous,
                    &accept_cancel,
                );
            }
        });

        Ok(Self {
            inbound: inbound_rx,
            connections,
            shutdown,
        })
    }

    /// Waits for the next inbound envelope. The leading frame is the sending
    /// connection's identity. Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionClosed`] once the listener task has
    /// stopped and all queued messages are drained.
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

    /// Routes an envelope to the connection named by its leading address
    /// frame. The frame is consumed.
    ///
    /// A message addressed to an identity with no live connection is dropped
    /// with a warning; a departed client must not take the broker down.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        let Some((identity, payload)) = envelope.pop_address() else {
            return Err(BrokerError::MalformedMessage(
                "router send requires a leading address frame".to_string(),
            ));
        };
        let connections = self.connections.lock().expect("connection table poisoned");
        match connections.get(&identity) {
            Some(outbound) => {
                if outbound.send(payload).is_err() {
                    warn!("dropping message for departed connection {:?}", identity);
                }
            }
            None => {
                warn!("dropping message for unknown identity {:?}", identity);
            }
        }
        Ok(())
    }
}

impl Drop for RouterSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn register_connection(
    mut stream: UnixStream,
    connections: &ConnectionTable,
    inbound: &mpsc::UnboundedSender<Envelope>,
    anonymous: &AtomicU64,
    cancel: &CancellationToken,
) {
    let connections = connections.clone();
    let inbound = inbound.clone();
    let cancel = cancel.clone();
    let serial = anonymous.fetch_add(1, Ordering::Relaxed);

    tokio::spawn(async move {
        let identity = match conn::read_greeting(&mut stream).await {
            Ok(identity) if !identity.is_empty() => identity,
            Ok(_) => Bytes::from(format!("conn-{:08x}", serial)),
            Err(e) => {
                debug!("greeting failed: {}", e);
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        // Last greeting wins: a reconnect under the same identity replaces
        // the old connection, whose writer exits when its sender drops.
        connections
            .lock()
            .expect("connection table poisoned")
            .insert(identity.clone(), outbound_tx.clone());

        let (read_half, write_half) = stream.into_split();
        let writer_cancel = cancel.clone();
        tokio::spawn(conn::write_loop(write_half, outbound_rx, writer_cancel));

        conn::read_loop(read_half, inbound, Some(identity.clone()), cancel).await;

        // Only unregister if this connection still owns the identity.
        let mut table = connections.lock().expect("connection table poisoned");
        if table
            .get(&identity)
            .is_some_and(|tx| tx.same_channel(&outbound_tx))
        {
            table.remove(&identity);
        }
    });
}

/// The dialing-side counterpart of [`RouterSocket`]: one socket holding a
/// named connection to each configured peer.
///
/// Outbound envelopes are routed by popping the leading address frame and
/// matching it against the peer names registered with [`connect`]. Inbound
/// envelopes arrive with the originating peer's name pushed as the leading
/// frame. Connections are established lazily and survive peer restarts.
///
/// [`connect`]: RouterConnector::connect
pub struct RouterConnector {
    identity: Bytes,
    peers: HashMap<Bytes, mpsc::UnboundedSender<Envelope>>,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    shutdown: CancellationToken,
}

impl RouterConnector {
    /// Creates a connector that announces `identity` to every peer it dials.
    pub fn new(identity: impl Into<Bytes>) -> Self {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        Self {
            identity: identity.into(),
            peers: HashMap::new(),
            inbound_tx,
            inbound,
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers a peer by name and starts dialing its endpoint in the
    /// background. Messages sent before the peer binds are buffered.
    pub fn connect(&mut self, peer: &str, path: PathBuf) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.peers.insert(Bytes::from(peer.to_string()), outbound_tx);
        conn::spawn_connector(
            path,
            self.identity.clone(),
            Some((self.inbound_tx.clone(), Some(Bytes::from(peer.to_string())))),
            Some(outbound_rx),
            self.shutdown.child_token(),
        );
    }

    /// Waits for the next inbound envelope. The leading frame names the peer
    /// it came from. Cancel-safe.
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

    /// Routes an envelope to the peer named by its leading address frame.
    /// The frame is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MalformedMessage`] if the envelope has no
    /// address frame or names a peer that was never registered.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        let Some((peer, payload)) = envelope.pop_address() else {
            return Err(BrokerError::MalformedMessage(
                "connector send requires a leading peer-name frame".to_string(),
            ));
        };
        let outbound = self.peers.get(&peer).ok_or_else(|| {
            BrokerError::MalformedMessage(format!("unknown peer {:?}", peer))
        })?;
        outbound
            .send(payload)
            .map_err(|_| BrokerError::ConnectionClosed)
    }
}

impl Drop for RouterConnector {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
