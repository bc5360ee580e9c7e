//! # Shared Types Crate
//!
//! Domain entities shared by every DynoLink subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-subsystem types are defined here.
//! - **Composite Identity**: channels are always addressed by
//!   [`ChannelKey`] (`provider_id`, `channel_id`), never by id or name alone,
//!   because several providers on one network may reuse identical ids.
//! - **Injected Time**: every time-dependent component reads the clock via
//!   [`TimeSource`] so tests can drive time deterministically.

pub mod alerts;
pub mod entities;
pub mod errors;
pub mod time;

pub use alerts::{Alert, AlertKind, AlertSeverity};
pub use entities::*;
pub use errors::*;
pub use time::{SystemTimeSource, TimeSource};

#[cfg(feature = "test-utils")]
pub use time::ManualTimeSource;
