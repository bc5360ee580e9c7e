//! Simulated providers on the in-memory network.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dl_01_wire_codec::{encode_body, Announcement, MessageBody, ValueRecord};
use shared_types::{ChannelId, ChannelInfo, ProviderId, TransportError, Unit};

use crate::adapters::{InMemoryEndpoint, InMemoryNetwork};
use crate::ports::{MessageSink, SendTarget};

/// A provider that announces channels and streams values.
pub struct SimulatedProvider {
    pub id: ProviderId,
    pub name: String,
    pub channels: Vec<ChannelInfo>,
    endpoint: InMemoryEndpoint,
    sequence: AtomicU8,
}

impl SimulatedProvider {
    pub fn new(
        network: &Arc<InMemoryNetwork>,
        addr: SocketAddr,
        id: u16,
        name: &str,
        channels: &[(u16, &str, Unit)],
    ) -> Self {
        Self {
            id: ProviderId(id),
            name: name.to_string(),
            channels: channels
                .iter()
                .map(|(cid, cname, unit)| ChannelInfo::new(ChannelId(*cid), *cname, *unit))
                .collect(),
            endpoint: network.endpoint(addr),
            sequence: AtomicU8::new(0),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.endpoint.addr()
    }

    pub fn endpoint(&self) -> &InMemoryEndpoint {
        &self.endpoint
    }

    pub async fn send_body(&self, body: &MessageBody) -> Result<(), TransportError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let bytes = encode_body(body, self.id, sequence, ProviderId::BROADCAST)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.endpoint.send(&bytes, SendTarget::Group).await
    }

    pub async fn announce(&self) -> Result<(), TransportError> {
        self.send_body(&MessageBody::Announcement(Announcement {
            name: self.name.clone(),
            channels: self.channels.clone(),
        }))
        .await
    }

    /// Send one values frame of `(channel, counter_ms, value)` records.
    pub async fn send_values(&self, values: &[(u16, u32, f32)]) -> Result<(), TransportError> {
        let records = values
            .iter()
            .map(|(channel, counter, value)| ValueRecord {
                channel: ChannelId(*channel),
                counter: *counter,
                value: *value,
            })
            .collect();
        self.send_body(&MessageBody::Values(records)).await
    }

    pub async fn clear(&self) -> Result<(), TransportError> {
        self.send_body(&MessageBody::Clear).await
    }
}
