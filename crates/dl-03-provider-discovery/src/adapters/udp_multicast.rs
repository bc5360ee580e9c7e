//! UDP multicast transport (production).
//!
//! One socket bound to the group port, joined to the group, used for both
//! directions.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use shared_types::TransportError;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::ports::{MessageSink, MessageSource, SendTarget};

/// Largest datagram accepted.
pub const MAX_DATAGRAM_LEN: usize = 65_535;

pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 2, 10);
pub const DEFAULT_PORT: u16 = 22344;

#[derive(Debug, Clone)]
pub struct MulticastConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    /// Local interface used to join the group.
    pub interface: Ipv4Addr,
    pub ttl: u32,
    /// Receive our own transmissions (they are self-filtered downstream).
    pub loopback: bool,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            loopback: true,
        }
    }
}

impl MulticastConfig {
    pub fn group_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.group, self.port))
    }
}

pub struct UdpMulticastTransport {
    socket: UdpSocket,
    group: SocketAddr,
}

impl UdpMulticastTransport {
    /// Bind the group port and join the group.
    ///
    /// # Errors
    ///
    /// [`TransportError::Bind`] if the port cannot be bound or the group
    /// cannot be joined. Fatal at startup.
    pub async fn bind(config: &MulticastConfig) -> Result<Self, TransportError> {
        if !config.group.is_multicast() {
            return Err(TransportError::InvalidAddress(format!(
                "{} is not a multicast group",
                config.group
            )));
        }

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));
        let bind_err = |e: std::io::Error| TransportError::Bind {
            addr: bind_addr.to_string(),
            reason: e.to_string(),
        };

        let socket = UdpSocket::bind(bind_addr).await.map_err(bind_err)?;
        socket
            .join_multicast_v4(config.group, config.interface)
            .map_err(bind_err)?;
        socket
            .set_multicast_loop_v4(config.loopback)
            .map_err(bind_err)?;
        socket.set_multicast_ttl_v4(config.ttl).map_err(bind_err)?;

        info!(
            group = %config.group,
            port = config.port,
            interface = %config.interface,
            "Joined multicast group"
        );

        Ok(Self {
            socket,
            group: config.group_addr(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl MessageSource for UdpMulticastTransport {
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, from))
    }
}

#[async_trait]
impl MessageSink for UdpMulticastTransport {
    async fn send(&self, datagram: &[u8], target: SendTarget) -> Result<(), TransportError> {
        let to = match target {
            SendTarget::Group => self.group,
            SendTarget::Unicast(addr) => addr,
        };
        let sent = self.socket.send_to(datagram, to).await?;
        debug!(to = %to, bytes = sent, "Datagram sent");
        Ok(())
    }
}
