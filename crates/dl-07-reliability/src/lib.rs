//! # Reliability Subsystem
//!
//! **Subsystem ID:** 7
//!
//! Keeps the ingestion pipeline alive under partial failure.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`CircuitBreakerRegistry`] | named breakers, one per external dependency |
//! | [`HealthMonitorRegistry`] | rolling success rate and latency per dependency |
//! | [`IngestionQueue`] | bounded priority queue between socket and workers |
//! | [`AlertBuffer`] | recent alerts, mirrored onto the event bus |
//! | [`ReliabilityAgent`] | facade: guarded calls, health snapshot, manual reset |
//!
//! ## Example
//!
//! ```rust,ignore
//! let agent = ReliabilityAgent::new(ReliabilityConfig::default(), clock, Some(bus));
//! match agent.call(TRANSPORT_BREAKER, sink.send(bytes, target)).await {
//!     Err(ReliabilityError::CircuitOpen { .. }) => { /* not attempted */ }
//!     other => other?,
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod agent;
pub mod alerts;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod health_monitor;
pub mod queue;

pub use agent::{ReliabilityAgent, ReliabilityHealth, ReliabilityStatus};
pub use alerts::AlertBuffer;
pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, CircuitStats,
    SAMPLE_FORWARDER_BREAKER, TRANSPORT_BREAKER,
};
pub use config::ReliabilityConfig;
pub use errors::ReliabilityError;
pub use health_monitor::{
    DependencyHealth, DependencyStats, HealthMonitorRegistry, HealthTransition, MonitorConfig,
};
pub use queue::{
    Dequeued, IngestionQueue, Priority, PriorityCounts, PushOutcome, QueueConfig, QueueStats,
    QueueStatsSource, INGESTION_QUEUE,
};
