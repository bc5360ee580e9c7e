//! # Provider Discovery Service
//!
//! Wires the registry to the transport ports and the event bus.
//!
//! - `core`: construction and breaker-guarded sends
//! - `events`: reactions to announce/clear/ping frames
//! - `api`: `discover`, `connect`, channel-info requests
//! - `maintenance`: timeout eviction

mod api;
mod core;
mod events;
mod maintenance;

pub use api::{cancelled, DiscoveryResult};
pub use core::DiscoveryService;
