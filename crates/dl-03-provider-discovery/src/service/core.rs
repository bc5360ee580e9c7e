use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dl_01_wire_codec::{encode_body, MessageBody};
use dl_07_reliability::{ReliabilityAgent, ReliabilityError, TRANSPORT_BREAKER};
use shared_bus::EventPublisher;
use shared_types::{ProviderId, TimeSource, Timestamp};
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::{DiscoveryConfig, DiscoveryError, ProviderRegistry, SequenceTracker};
use crate::ports::{MessageSink, SendTarget};

/// Provider Discovery Service.
///
/// Owns the registry and sequence tracker, reacts to discovery-related
/// frames handed over by the receive workers, and sends requests/pongs
/// through the `transport` circuit breaker.
pub struct DiscoveryService {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) sequences: SequenceTracker,
    pub(crate) sink: Arc<dyn MessageSink>,
    pub(crate) reliability: Arc<ReliabilityAgent>,
    pub(crate) publisher: Arc<dyn EventPublisher>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) config: DiscoveryConfig,
    /// Woken on every applied announcement.
    pub(crate) announcements: Notify,
    tx_sequence: AtomicU8,
}

impl DiscoveryService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        sink: Arc<dyn MessageSink>,
        reliability: Arc<ReliabilityAgent>,
        publisher: Arc<dyn EventPublisher>,
        time_source: Arc<dyn TimeSource>,
        config: DiscoveryConfig,
    ) -> Self {
        reliability.register_dependency(TRANSPORT_BREAKER);
        Self {
            registry,
            sequences: SequenceTracker::new(),
            sink,
            reliability,
            publisher,
            time_source,
            config,
            announcements: Notify::new(),
            tx_sequence: AtomicU8::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn sequences(&self) -> &SequenceTracker {
        &self.sequences
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Encode `body` as this node and send it through the transport breaker.
    pub async fn send(
        &self,
        body: &MessageBody,
        destination: ProviderId,
        target: SendTarget,
    ) -> Result<(), DiscoveryError> {
        // Unassigned nodes still need a sender id on the wire; 0 is never
        // self-filtered because no id is assigned.
        let sender = self.registry.node_id().unwrap_or(ProviderId(0));
        let sequence = self.tx_sequence.fetch_add(1, Ordering::Relaxed);
        let bytes = encode_body(body, sender, sequence, destination)?;

        debug!(
            key = %body.key(),
            destination = %destination,
            ?target,
            "Sending discovery message"
        );

        self.reliability
            .call(TRANSPORT_BREAKER, self.sink.send(&bytes, target))
            .await
            .map_err(|err| match err {
                ReliabilityError::CircuitOpen { name } => DiscoveryError::CircuitOpen { name },
                ReliabilityError::Inner(transport) => DiscoveryError::Transport(transport),
            })
    }
}
