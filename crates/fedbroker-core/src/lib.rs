//! Fedbroker Core
//!
//! The broker itself: a node that load-balances client requests across a
//! pool of local workers and, when local capacity is exhausted, forwards
//! overflow work to peer brokers while advertising its own spare capacity to
//! them.
//!
//! # Components
//!
//! - [`config`] - Broker configuration with builder-style defaults
//! - [`worker_pool`] - FIFO queue of idle local workers
//! - [`gossip`] - Capacity beacons in and out
//! - [`routing`] - Reply-destination and request-placement decisions
//! - [`stats`] - Message counters reported at shutdown
//! - [`broker`] - The event loop tying it all together
//!
//! # Event loop shape
//!
//! Each tick waits on the two backends plus the state and monitor channels,
//! dispatches exactly one ready event, then drains as much frontend demand as
//! current capacity allows, placing requests on local workers first and
//! overflowing to a random peer otherwise. Peer-originated demand is drained
//! before local demand so that peers relying on this node as overflow
//! capacity are never starved. A capacity beacon goes out only on ticks where
//! the idle-worker count actually changed.

pub mod broker;
pub mod config;
pub mod gossip;
pub mod routing;
pub mod stats;
pub mod worker_pool;

pub use broker::Broker;
pub use config::BrokerConfig;
pub use gossip::CapacityGossip;
pub use stats::BrokerStats;
pub use worker_pool::WorkerPool;
