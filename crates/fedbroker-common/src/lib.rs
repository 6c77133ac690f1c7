//! Fedbroker Common Types and Transport
//!
//! This crate provides the shared protocol definitions and the socket
//! transport layer for the fedbroker federation.
//!
//! # Overview
//!
//! Fedbroker is a federated request broker: each node load-balances client
//! requests across a pool of local workers and forwards overflow work to peer
//! brokers while advertising its own spare capacity. This crate contains the
//! pieces every component shares:
//!
//! - **Envelope**: a multi-frame message that accumulates routing addresses
//!   as it traverses identity-routing sockets
//! - **Protocol Layer**: the worker READY sentinel, the capacity beacon wire
//!   format, and error handling
//! - **Transport Layer**: Unix-domain-socket messaging with identity routing,
//!   publish/subscribe fan-out, and push/pull collection
//!
//! # Architecture
//!
//! The system uses a simple wire protocol:
//! - **Transport**: Unix domain sockets, one stream per connected peer
//! - **Message Format**: `[4-byte frame count] + [4-byte length + data]*`,
//!   all lengths u32 big-endian
//! - **Max Frame Size**: 16 MB (prevents memory exhaustion)
//!
//! # Components
//!
//! - [`envelope`] - The [`Envelope`](envelope::Envelope) frame sequence
//! - [`protocol`] - READY sentinel, [`StateMessage`](protocol::StateMessage),
//!   and [`BrokerError`](protocol::BrokerError)
//! - [`transport`] - Socket types and endpoint naming

pub mod envelope;
pub mod protocol;
pub mod transport;

pub use envelope::Envelope;
pub use protocol::{BrokerError, Result, StateMessage};
