//! Fedbroker Transport Layer
//!
//! Unix-domain-socket messaging between brokers, workers, and clients.
//!
//! # Architecture
//!
//! A message is an [`Envelope`](crate::envelope::Envelope): an ordered frame
//! sequence carried over a stream as
//! `[u32 frame count] + ([u32 length][data])*`. On connect, every dialing
//! socket sends a one-frame greeting announcing its identity (empty for
//! anonymous sockets); bound sockets use the greeting to register the
//! connection's return address.
//!
//! # Socket types
//!
//! - **[`RouterSocket`]** (bind): identity routing. Inbound envelopes gain
//!   the sender's identity as leading frame; outbound envelopes are routed by
//!   popping it.
//! - **[`RouterConnector`]** (connect): the dialing counterpart, one named
//!   connection per configured peer.
//! - **[`DealerSocket`]** (connect): anonymous send/receive for worker and
//!   client stubs.
//! - **[`PubSocket`]** / **[`SubSocket`]**: capacity-beacon fan-out.
//! - **[`PushSocket`]** / **[`PullSocket`]**: printable-status collection.
//!
//! All dialing sockets connect lazily and reconnect after failures, so
//! processes may start in any order. Sends are fire-and-forget; receipt is
//! exposed as a cancel-safe `recv()` plus a non-blocking `try_recv()`, which
//! the broker composes into its prioritized readiness waits.
//!
//! # Endpoint naming
//!
//! [`Endpoints`] derives every channel's socket path from a node name and a
//! shared runtime directory; see its docs for the scheme.

pub mod codec;
mod conn;
pub mod dealer;
pub mod endpoint;
pub mod pubsub;
pub mod pushpull;
pub mod router;

pub use dealer::DealerSocket;
pub use endpoint::Endpoints;
pub use pubsub::{PubSocket, SubSocket};
pub use pushpull::{PullSocket, PushSocket};
pub use router::{RouterConnector, RouterSocket};
