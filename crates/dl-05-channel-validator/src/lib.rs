//! # Channel Validator Subsystem
//!
//! **Subsystem ID:** 5
//!
//! Keeps rolling metrics for every scoped channel key and classifies channel
//! and pipeline health on read.
//!
//! ## Channel health (worst first)
//!
//! | Status | Condition |
//! |--------|-----------|
//! | `Stale` | no sample for `stale_after` (or never sampled) |
//! | `Critical` | invalid ratio ≥ `critical_invalid_ratio`, or rate < `min_rate_hz` |
//! | `Warning` | rate < `target_rate_hz`, or any invalid value in the window |
//! | `Healthy` | otherwise |
//!
//! Health is never cached: every read recomputes it against the current
//! time, so a channel that went silent reads `Stale` on the very next query.
//!
//! ## Pipeline health
//!
//! Any channel critical wins, then a stale majority, then any warning. The
//! result is downgraded to at least `Warning` while the frame drop ratio is
//! above `drop_ratio_threshold`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod frames;
pub mod health;
pub mod metrics;
pub mod ranges;
pub mod session;
pub mod validator;

pub use config::ValidatorConfig;
pub use frames::{FrameStats, FrameStatsSnapshot};
pub use health::{classify_channel, overall_status, ChannelHealth, HealthStatus, PipelineHealth};
pub use metrics::{ChannelMetrics, ChannelMetricsSnapshot};
pub use ranges::UnitRanges;
pub use session::{CaptureSession, CaptureSummary};
pub use validator::{ChannelValidator, RecordOutcome};
