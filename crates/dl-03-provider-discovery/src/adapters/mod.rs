//! Adapters Layer - transport implementations
//!
//! - `udp_multicast`: production socket joined to the telemetry group
//! - `memory`: in-process network for tests and simulations

pub mod memory;
pub mod udp_multicast;

pub use memory::{InMemoryEndpoint, InMemoryNetwork};
pub use udp_multicast::{
    MulticastConfig, UdpMulticastTransport, DEFAULT_GROUP, DEFAULT_PORT, MAX_DATAGRAM_LEN,
};
