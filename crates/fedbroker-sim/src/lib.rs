//! Fedbroker Simulation Stubs
//!
//! The concurrent actors that surround a broker in a simulation: echo
//! workers that serve jobs, burst clients that generate sporadic demand, and
//! a retry client demonstrating the bounded-retry reliability pattern the
//! broker itself deliberately omits.
//!
//! Every stub talks to its broker exclusively through the transport; nothing
//! here shares memory with broker state.

pub mod client;
pub mod retry;
pub mod worker;

pub use client::{BurstClient, ClientConfig};
pub use retry::{RetryClient, RetryConfig};
pub use worker::{EchoWorker, WorkerConfig};
