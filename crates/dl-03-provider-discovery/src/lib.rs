//! # Provider Discovery Subsystem
//!
//! **Subsystem ID:** 3
//!
//! Maintains the live catalog of broadcasting providers and the channels
//! they declare.
//!
//! ## Rules
//!
//! - An announcement replaces the provider's name and channel set; nothing
//!   is merged. Renames are logged, never persisted.
//! - Clearing a provider captures its last-known name atomically and emits a
//!   `ProviderCleared` event carrying it.
//! - Providers silent past the provider timeout are evicted by maintenance.
//! - Frames whose sender id equals this node's id are dropped before any
//!   other processing; without an assigned id nothing is self-filtered.
//!
//! ## Architecture
//!
//! - **Domain Layer:** registry, node identity, sequence tracking
//! - **Ports Layer:** `MessageSource` / `MessageSink`
//! - **Service Layer:** `DiscoveryService` (discover, connect, handlers)
//! - **Adapters Layer:** UDP multicast, in-memory network

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Simulated providers for tests.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapters::{
    InMemoryEndpoint, InMemoryNetwork, MulticastConfig, UdpMulticastTransport, DEFAULT_GROUP,
    DEFAULT_PORT,
};
pub use domain::{
    AnnounceOutcome, DiscoveryConfig, DiscoveryError, ProviderRegistry, SequenceOutcome,
    SequenceTracker,
};
pub use ports::{MessageSink, MessageSource, SendTarget};
pub use service::{cancelled, DiscoveryResult, DiscoveryService};
