//! Fedbroker Protocol Layer
//!
//! Wire-level conventions shared by brokers, workers, and clients:
//!
//! - The worker READY sentinel, a reserved one-byte marker a worker sends on
//!   first connecting to announce "idle, no payload"
//! - The capacity beacon format brokers gossip over the state channel:
//!   two frames, `(node name, stringified capacity)`
//! - The [`BrokerError`] taxonomy used across the workspace

pub mod error;

#[cfg(test)]
mod tests;

pub use error::{BrokerError, Result};

use bytes::Bytes;

use crate::envelope::Envelope;

/// Reserved byte a worker sends as its entire first message, announcing it is
/// idle. Consumed by the broker, never forwarded to a client.
pub const READY_SENTINEL: u8 = 0x01;

/// Builds the single-frame idle announcement a worker sends on connect.
pub fn ready_envelope() -> Envelope {
    Envelope::from_frames(vec![Bytes::from_static(&[READY_SENTINEL])])
}

/// True if the envelope is exactly the worker READY announcement: one frame,
/// one sentinel byte. Payloads that merely start with the sentinel byte do
/// not match.
pub fn is_ready(envelope: &Envelope) -> bool {
    envelope.frame_count() == 1 && envelope.frames()[0].as_ref() == [READY_SENTINEL].as_slice()
}

/// A capacity beacon broadcast on the state channel.
///
/// Brokers publish one beacon whenever their idle-worker count changes; peers
/// overwrite their aggregate cloud-capacity estimate with each beacon they
/// receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMessage {
    /// Name of the broadcasting node.
    pub peer: String,
    /// Idle-worker count the node last advertised.
    pub capacity: u32,
}

impl StateMessage {
    /// Creates a beacon for the given node and capacity.
    pub fn new(peer: impl Into<String>, capacity: u32) -> Self {
        Self {
            peer: peer.into(),
            capacity,
        }
    }

    /// Encodes the beacon as its two-frame wire form:
    /// `(name, stringified capacity)`.
    pub fn encode(&self) -> Envelope {
        Envelope::from_frames(vec![
            Bytes::from(self.peer.clone().into_bytes()),
            Bytes::from(self.capacity.to_string().into_bytes()),
        ])
    }

    /// Decodes a beacon from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MalformedBeacon`] if the envelope does not hold
    /// exactly two frames, the name is not UTF-8, or the capacity is not a
    /// non-negative integer.
    pub fn decode(envelope: &Envelope) -> Result<Self> {
        let frames = envelope.frames();
        if frames.len() != 2 {
            return Err(BrokerError::MalformedBeacon(format!(
                "expected 2 frames, got {}",
                frames.len()
            )));
        }
        let peer = std::str::from_utf8(&frames[0])
            .map_err(|e| BrokerError::MalformedBeacon(format!("peer name not UTF-8: {}", e)))?;
        let capacity = std::str::from_utf8(&frames[1])
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| {
                BrokerError::MalformedBeacon(format!(
                    "capacity frame is not an unsigned integer: {:?}",
                    &frames[1]
                ))
            })?;
        Ok(Self::new(peer, capacity))
    }
}
