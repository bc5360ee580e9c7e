//! # Session Pinning Subsystem
//!
//! **Subsystem ID:** 4
//!
//! A capture session is pinned to exactly one provider. While pinned, frames
//! from any other sender are counted and discarded before they can reach
//! channel metrics, even when their channel ids collide numerically with the
//! pinned provider's.
//!
//! ## Rules
//!
//! - The pin is set once at session start. Pinning while pinned is an error;
//!   re-announcements from any provider never repin.
//! - Stopping the session clears the pin.
//! - With no active session every sender is admitted.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod errors;
pub mod filter;

pub use errors::PinError;
pub use filter::{Admission, PinFilter, PinStats, SessionPin};
