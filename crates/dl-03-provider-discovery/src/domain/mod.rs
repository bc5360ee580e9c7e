//! Domain Layer - registry state with no I/O
//!
//! - Provider registry (replace-on-announce, atomic clear, expiry)
//! - Node identity (assigned or random, never the broadcast id)
//! - Per-sender sequence tracking

pub mod config;
pub mod errors;
pub mod registry;
pub mod sequence;

pub use config::*;
pub use errors::*;
pub use registry::*;
pub use sequence::*;
