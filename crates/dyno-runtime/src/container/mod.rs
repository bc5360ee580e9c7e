//! # Subsystem Container
//!
//! Configuration and the dependency-ordered construction of every
//! subsystem the pipeline uses.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, RuntimeConfig};
pub use subsystems::{InboundDatagram, SubsystemContainer};
