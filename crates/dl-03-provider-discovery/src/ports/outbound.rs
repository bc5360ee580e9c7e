//! Driven Ports (SPI - Outbound Dependencies)

use async_trait::async_trait;
use shared_types::TransportError;
use std::net::SocketAddr;

/// Where an outbound datagram goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTarget {
    /// The multicast group every node listens on.
    Group,
    /// A single node.
    Unicast(SocketAddr),
}

/// Inbound datagrams.
///
/// `recv` is the only place the receive loop may wait.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Receive the next datagram and the address it came from.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] once the transport is shut down; other
    /// errors concern a single receive and may be retried.
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
}

/// Outbound datagrams.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, datagram: &[u8], target: SendTarget) -> Result<(), TransportError>;
}
