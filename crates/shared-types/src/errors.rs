//! # Error Types
//!
//! Errors shared by the transport ports and their adapters.

use thiserror::Error;

/// Errors raised by inbound/outbound message transports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport could not be bound (fatal at startup).
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// The destination could not be resolved to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A send or receive failed at the socket layer.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The transport was shut down.
    #[error("transport closed")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
