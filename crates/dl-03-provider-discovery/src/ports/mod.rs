//! Ports Layer - Transport traits
//!
//! Defines the outbound interfaces the discovery service and the runtime
//! receive loop depend on. Adapters implement them for UDP multicast and an
//! in-memory network.

pub mod outbound;

pub use outbound::*;
