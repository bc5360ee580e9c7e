//! # Integration Scenarios
//!
//! Cross-subsystem flows: datagrams enter through the in-memory transport,
//! pass the receive loop, the ingestion queue and the decode workers, and
//! end up in the validator, the preflight engine and the event bus.

#[cfg(test)]
pub(crate) mod fixtures;

pub mod forwarding;
pub mod ingestion;
pub mod scenarios;
