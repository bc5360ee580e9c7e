//! Domain Layer - wire layouts with no I/O
//!
//! - Header: the fixed 8-byte little-endian prefix and message keys
//! - Payloads: announcement descriptors and value records
//! - Errors: per-message framing and encoding failures

pub mod errors;
pub mod header;
pub mod payloads;

pub use errors::*;
pub use header::*;
pub use payloads::*;
