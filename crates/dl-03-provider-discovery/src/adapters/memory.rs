//! In-memory network for tests.
//!
//! Every endpoint gets a bounded inbox. Group sends reach every endpoint
//! (including the sender, like multicast loopback); unicast sends reach one.
//! A full inbox drops the datagram, as a socket buffer would.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::TransportError;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use crate::ports::{MessageSink, MessageSource, SendTarget};

const DEFAULT_INBOX_CAPACITY: usize = 1024;

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Debug)]
pub struct InMemoryNetwork {
    inboxes: RwLock<HashMap<SocketAddr, mpsc::Sender<Datagram>>>,
    inbox_capacity: usize,
    offline: AtomicBool,
    dropped: AtomicU64,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Self::with_inbox_capacity(DEFAULT_INBOX_CAPACITY)
    }

    pub fn with_inbox_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inboxes: RwLock::new(HashMap::new()),
            inbox_capacity: capacity.max(1),
            offline: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    /// Attach an endpoint at `addr`, replacing any previous one.
    pub fn endpoint(self: &Arc<Self>, addr: SocketAddr) -> InMemoryEndpoint {
        let (tx, rx) = mpsc::channel(self.inbox_capacity);
        self.inboxes.write().insert(addr, tx);
        InMemoryEndpoint {
            addr,
            network: Arc::clone(self),
            inbox: Mutex::new(rx),
            sent: AtomicU64::new(0),
        }
    }

    /// While offline every send fails with an I/O error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Datagrams lost to full inboxes or unknown unicast targets.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, from: SocketAddr, datagram: &[u8], target: SendTarget) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Io("network offline".into()));
        }

        let inboxes = self.inboxes.read();
        let recipients: Vec<&mpsc::Sender<Datagram>> = match target {
            SendTarget::Group => inboxes.values().collect(),
            SendTarget::Unicast(addr) => inboxes.get(&addr).into_iter().collect(),
        };

        if recipients.is_empty() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        for inbox in recipients {
            if inbox.try_send((datagram.to_vec(), from)).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

pub struct InMemoryEndpoint {
    addr: SocketAddr,
    network: Arc<InMemoryNetwork>,
    inbox: Mutex<mpsc::Receiver<Datagram>>,
    sent: AtomicU64,
}

impl InMemoryEndpoint {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Next datagram if one is already waiting.
    pub fn try_recv(&self) -> Option<Datagram> {
        self.inbox.try_lock().ok()?.try_recv().ok()
    }

    /// Detach from the network; pending `recv` calls return `Closed`.
    pub fn detach(&self) {
        self.network.inboxes.write().remove(&self.addr);
    }
}

#[async_trait]
impl MessageSource for InMemoryEndpoint {
    async fn recv(&self) -> Result<Datagram, TransportError> {
        self.inbox.lock().await.recv().await.ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl MessageSink for InMemoryEndpoint {
    async fn send(&self, datagram: &[u8], target: SendTarget) -> Result<(), TransportError> {
        self.network.deliver(self.addr, datagram, target)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        trace!(from = %self.addr, ?target, bytes = datagram.len(), "In-memory datagram sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_group_send_reaches_everyone() {
        let net = InMemoryNetwork::new();
        let a = net.endpoint(addr(1));
        let b = net.endpoint(addr(2));

        a.send(b"hello", SendTarget::Group).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), (b"hello".to_vec(), addr(1)));
        assert_eq!(a.recv().await.unwrap().0, b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_unicast_reaches_one() {
        let net = InMemoryNetwork::new();
        let a = net.endpoint(addr(1));
        let b = net.endpoint(addr(2));
        let c = net.endpoint(addr(3));

        a.send(b"ping", SendTarget::Unicast(addr(2))).await.unwrap();

        assert!(b.try_recv().is_some());
        assert!(c.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_offline_network_fails_sends() {
        let net = InMemoryNetwork::new();
        let a = net.endpoint(addr(1));
        net.set_offline(true);
        assert!(matches!(
            a.send(b"x", SendTarget::Group).await,
            Err(TransportError::Io(_))
        ));
        assert_eq!(a.sent(), 0);
    }

    #[tokio::test]
    async fn test_full_inbox_drops() {
        let net = InMemoryNetwork::with_inbox_capacity(1);
        let a = net.endpoint(addr(1));
        let b = net.endpoint(addr(2));

        a.send(b"1", SendTarget::Unicast(addr(2))).await.unwrap();
        a.send(b"2", SendTarget::Unicast(addr(2))).await.unwrap();

        assert_eq!(net.dropped(), 1);
        assert_eq!(b.try_recv().unwrap().0, b"1".to_vec());
    }

    #[tokio::test]
    async fn test_detached_endpoint_is_closed() {
        let net = InMemoryNetwork::new();
        let a = net.endpoint(addr(1));
        a.detach();
        assert_eq!(a.recv().await, Err(TransportError::Closed));
    }
}
