//! # DynoLink Test Suite
//!
//! End-to-end scenarios over the in-memory multicast network. Every test
//! drives a real [`dyno_runtime::DynoRuntime`] (or a single subsystem where
//! the clock must be controlled) through simulated providers.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── scenarios.rs     # isolation, preflight verdicts, breaker recovery
//! │   ├── ingestion.rs     # backpressure, staleness, clock reconciliation
//! │   └── forwarding.rs    # downstream forwarder behind its breaker
//! └── benches/
//!     └── pipeline_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p dl-tests
//! cargo test -p dl-tests integration::scenarios::
//!
//! # Benchmarks
//! cargo bench -p dl-tests
//! ```

#![allow(dead_code)]

pub mod integration;
