//! # Preflight Subsystem
//!
//! **Subsystem ID:** 6
//!
//! A five-stage gate run before a capture session may start.
//!
//! | Stage | Checks | Affects verdict |
//! |-------|--------|-----------------|
//! | 1. Connectivity | provider discovered and responsive | yes |
//! | 2. Required channels | RPM and at least one AFR | yes |
//! | 3. Recommended channels | MAP, TPS, Torque, Power | no (warnings) |
//! | 4. Health thresholds | freshness, rate, frame drop ratio | no |
//! | 5. Semantic | plausibility ranges, frozen signals, power/torque consistency | no |
//!
//! Every reachable stage runs so the result is a complete diagnostic
//! checklist. Stages 2-5 are unreachable without a provider.
//!
//! [`evaluate`] is pure: the same inputs always produce the same checks and
//! verdict. [`PreflightEngine`] gathers those inputs (a passive health
//! window, then an active sampling window) and can be cancelled, in which
//! case the result is flagged `incomplete`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod engine;
pub mod evaluate;
pub mod result;
pub mod semantic;
pub mod signals;

pub use config::{CrossSignalConfig, PreflightConfig};
pub use engine::{PreflightEngine, PreflightRequest, PreflightSources};
pub use evaluate::{evaluate, select_provider, PreflightInput};
pub use result::{
    CheckResult, CheckSeverity, Hypothesis, HypothesisKind, OverrideError, OverrideRecord,
    PreflightMode, PreflightResult, Stage,
};
pub use semantic::SampleWindow;
pub use signals::SignalSpec;
