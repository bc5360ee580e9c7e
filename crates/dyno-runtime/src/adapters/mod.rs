//! # Adapters
//!
//! Port implementations connecting subsystems to each other and to
//! collaborators outside the pipeline.

pub mod forwarder;
pub mod preflight_sources;

pub use forwarder::{ChannelForwarder, ForwardError, SampleForwarder};
pub use preflight_sources::PipelineSources;
