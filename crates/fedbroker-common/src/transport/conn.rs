//! Shared per-connection plumbing for the socket types.
//!
//! Every connection runs a reader task and a writer task. Readers forward
//! inbound envelopes into the owning socket's queue, optionally prepending an
//! identity frame; writers drain an unbounded outbound queue, which gives
//! every socket fire-and-forget send semantics. Connect-mode sockets run a
//! connector task that establishes the stream lazily and re-establishes it
//! after failures, so a node may start before the peers it dials.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::envelope::Envelope;
use crate::protocol::error::{BrokerError, Result};
use crate::transport::codec::{read_envelope, write_envelope};

/// First reconnect delay for a connector; doubles per failure up to
/// [`RECONNECT_DELAY_MAX`].
const RECONNECT_DELAY_MIN: Duration = Duration::from_millis(50);
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(1);

/// Sends the connection greeting: a single frame carrying the dialing
/// socket's identity, or an empty frame for anonymous sockets.
pub(crate) async fn send_greeting(stream: &mut UnixStream, identity: Bytes) -> Result<()> {
    write_envelope(stream, &Envelope::from_frames(vec![identity])).await
}

/// Reads the connection greeting and returns the announced identity; empty
/// means anonymous.
pub(crate) async fn read_greeting(stream: &mut UnixStream) -> Result<Bytes> {
    let envelope = read_envelope(stream).await?;
    envelope
        .into_frames()
        .into_iter()
        .next()
        .ok_or_else(|| BrokerError::MalformedMessage("empty greeting".to_string()))
}

/// Forwards envelopes from the stream into `inbound` until the connection or
/// the socket goes away. If `prefix` is set, it is pushed as the leading
/// address frame of every forwarded envelope.
pub(crate) async fn read_loop(
    mut half: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<Envelope>,
    prefix: Option<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = read_envelope(&mut half) => {
                let envelope = match result {
                    Ok(envelope) => envelope,
                    Err(BrokerError::ConnectionClosed) => {
                        trace!("connection closed by remote");
                        return;
                    }
                    Err(e) => {
                        debug!("read failed: {}", e);
                        return;
                    }
                };
                let envelope = match &prefix {
                    Some(identity) => envelope.push_address(identity.clone()),
                    None => envelope,
                };
                if inbound.send(envelope).is_err() {
                    return;
                }
            }
        }
    }
}

/// Drains `outbound` into the stream until the connection or the socket goes
/// away.
pub(crate) async fn write_loop(
    mut half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            message = outbound.recv() => {
                let Some(envelope) = message else { return };
                if let Err(e) = write_envelope(&mut half, &envelope).await {
                    debug!("write failed: {}", e);
                    return;
                }
            }
        }
    }
}

/// Spawns a connector task that dials `path`, retrying until the remote end
/// binds, and keeps the connection alive across failures.
///
/// Messages queued on `outbound` while disconnected are buffered and flushed
/// once the connection is up; a socket with no send side passes `None`. If
/// `inbound` is provided, received envelopes are forwarded through it,
/// prefixed with the given identity frame when one is set.
pub(crate) fn spawn_connector(
    path: PathBuf,
    identity: Bytes,
    inbound: Option<(mpsc::UnboundedSender<Envelope>, Option<Bytes>)>,
    mut outbound: Option<mpsc::UnboundedReceiver<Envelope>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut delay = RECONNECT_DELAY_MIN;
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                result = UnixStream::connect(&path) => result,
            };
            let mut stream = match connected {
                Ok(stream) => stream,
                Err(_) => {
                    // Remote side has not bound yet, or went away; back off.
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = (delay * 2).min(RECONNECT_DELAY_MAX);
                    continue;
                }
            };
            delay = RECONNECT_DELAY_MIN;

            if send_greeting(&mut stream, identity.clone()).await.is_err() {
                continue;
            }
            trace!("connected to {:?}", path);

            let (read_half, mut write_half) = stream.into_split();
            let conn_cancel = cancel.child_token();
            if let Some((inbound_tx, prefix)) = inbound.clone() {
                let reader_cancel = conn_cancel.clone();
                tokio::spawn(async move {
                    read_loop(read_half, inbound_tx, prefix, reader_cancel.clone()).await;
                    reader_cancel.cancel();
                });
            }

            // Write side runs inline so the connector notices a dead
            // connection and reconnects with the outbound queue intact.
            match outbound.as_mut() {
                Some(queue) => loop {
                    tokio::select! {
                        _ = conn_cancel.cancelled() => break,
                        message = queue.recv() => {
                            let Some(envelope) = message else {
                                conn_cancel.cancel();
                                return;
                            };
                            if let Err(e) = write_envelope(&mut write_half, &envelope).await {
                                debug!("write to {:?} failed: {}", path, e);
                                conn_cancel.cancel();
                                break;
                            }
                        }
                    }
                },
                // Receive-only connection: park until the reader exits.
                None => conn_cancel.cancelled().await,
            }
        }
    });
}
