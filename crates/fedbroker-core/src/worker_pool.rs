use std::collections::VecDeque;

use bytes::Bytes;

use fedbroker_common::protocol::{self, Result};
use fedbroker_common::{BrokerError, Envelope};

/// FIFO queue of currently-idle local workers.
///
/// A worker becomes idle by sending its READY announcement or by completing
/// a job; either way the backend message carries the worker's identity as
/// leading address frame, which is extracted and enqueued here. Workers are
/// handed out oldest-idle-first. The queue length *is* the broker's local
/// capacity; there is no separate counter to drift out of sync.
#[derive(Debug, Default)]
pub struct WorkerPool {
    idle: VecDeque<Bytes>,
}

impl WorkerPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a message from the local backend.
    ///
    /// Pops the worker identity off the envelope and enqueues it as idle.
    /// Returns `None` if the rest of the message was the READY announcement
    /// (swallowed, never routed), otherwise the remaining envelope to route
    /// onward.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MalformedMessage`] if the message carries no
    /// identity frame.
    pub fn on_worker_message(&mut self, message: Envelope) -> Result<Option<Envelope>> {
        let Some((identity, payload)) = message.pop_address() else {
            return Err(BrokerError::MalformedMessage(
                "backend message without worker identity".to_string(),
            ));
        };
        self.idle.push_back(identity);
        if protocol::is_ready(&payload) {
            Ok(None)
        } else {
            Ok(Some(payload))
        }
    }

    /// Takes the oldest-idle worker's identity.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty. Capacity tracking guarantees the broker
    /// only assigns work while `capacity() > 0`; an empty pool here is a
    /// logic error, not a runtime condition.
    pub fn take_worker(&mut self) -> Bytes {
        self.idle
            .pop_front()
            .expect("take_worker called with no idle workers")
    }

    /// Number of idle workers.
    pub fn capacity(&self) -> usize {
        self.idle.len()
    }

    /// Releases all queued identities during teardown, returning how many
    /// were held.
    pub fn drain(&mut self) -> usize {
        let released = self.idle.len();
        self.idle.clear();
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedbroker_common::protocol::ready_envelope;

    fn backend_message(identity: &'static [u8], payload: Envelope) -> Envelope {
        payload.push_address(Bytes::from_static(identity))
    }

    #[test]
    fn test_ready_enqueues_worker_and_swallows_payload() {
        let mut pool = WorkerPool::new();
        let routed = pool
            .on_worker_message(backend_message(b"w1", ready_envelope()))
            .unwrap();
        assert!(routed.is_none());
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_repeated_ready_signals_accumulate_capacity() {
        let mut pool = WorkerPool::new();
        for identity in [&b"w1"[..], b"w2", b"w3"] {
            let routed = pool
                .on_worker_message(ready_envelope().push_address(Bytes::copy_from_slice(identity)))
                .unwrap();
            assert!(routed.is_none());
        }
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn test_reply_enqueues_worker_and_returns_payload() {
        let mut pool = WorkerPool::new();
        let reply = Envelope::from_body("result").push_address("client-7");
        let routed = pool
            .on_worker_message(backend_message(b"w1", reply.clone()))
            .unwrap();
        assert_eq!(routed, Some(reply));
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_take_worker_is_oldest_idle_first() {
        let mut pool = WorkerPool::new();
        pool.on_worker_message(backend_message(b"w1", ready_envelope()))
            .unwrap();
        pool.on_worker_message(backend_message(b"w2", ready_envelope()))
            .unwrap();

        assert_eq!(pool.take_worker().as_ref(), b"w1");
        assert_eq!(pool.take_worker().as_ref(), b"w2");
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn test_capacity_always_equals_queue_length() {
        let mut pool = WorkerPool::new();
        assert_eq!(pool.capacity(), 0);
        pool.on_worker_message(backend_message(b"w1", ready_envelope()))
            .unwrap();
        assert_eq!(pool.capacity(), 1);
        pool.take_worker();
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn test_empty_message_is_malformed() {
        let mut pool = WorkerPool::new();
        assert!(pool.on_worker_message(Envelope::new()).is_err());
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    #[should_panic(expected = "no idle workers")]
    fn test_take_worker_on_empty_pool_panics() {
        WorkerPool::new().take_worker();
    }

    #[test]
    fn test_drain_releases_all_identities() {
        let mut pool = WorkerPool::new();
        pool.on_worker_message(backend_message(b"w1", ready_envelope()))
            .unwrap();
        pool.on_worker_message(backend_message(b"w2", ready_envelope()))
            .unwrap();
        assert_eq!(pool.drain(), 2);
        assert_eq!(pool.capacity(), 0);
    }
}
