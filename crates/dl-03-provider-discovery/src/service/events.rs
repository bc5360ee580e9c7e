use std::net::SocketAddr;

use dl_01_wire_codec::{Announcement, MessageBody, MessageHeader};
use shared_bus::{ClearReason, TelemetryEvent};
use shared_types::{Provider, ProviderId};
use tracing::{debug, info, warn};

use crate::domain::{AnnounceOutcome, SequenceOutcome};
use crate::ports::SendTarget;
use crate::service::DiscoveryService;

impl DiscoveryService {
    /// Whether a frame from `sender` must be discarded as our own echo.
    pub fn is_self(&self, sender: ProviderId) -> bool {
        self.registry.is_self(sender)
    }

    /// Bookkeeping for every non-self frame: remember the sender, refresh
    /// last-seen and track its sequence number.
    pub fn observe_frame(&self, header: &MessageHeader) -> SequenceOutcome {
        self.registry.observe_sender(header.sender);
        self.registry.touch(header.sender, self.now());
        self.sequences.observe(header.sender, header.sequence)
    }

    /// Apply a channel announcement (replace, never merge).
    pub fn handle_announcement(
        &self,
        sender: ProviderId,
        source: SocketAddr,
        announcement: Announcement,
    ) -> AnnounceOutcome {
        let name = announcement.name.clone();
        let channel_count = announcement.channels.len();
        let outcome = self
            .registry
            .apply_announcement(sender, source, announcement, self.now());

        let event = match &outcome {
            AnnounceOutcome::Discovered => {
                info!(provider_id = %sender, %name, channel_count, %source, "Provider discovered");
                TelemetryEvent::ProviderDiscovered {
                    provider_id: sender,
                    name,
                    channel_count,
                }
            }
            AnnounceOutcome::Updated { previous_name } => {
                if *previous_name != name {
                    info!(
                        provider_id = %sender,
                        previous_name = %previous_name,
                        %name,
                        "Provider renamed"
                    );
                } else {
                    debug!(provider_id = %sender, channel_count, "Provider re-announced");
                }
                TelemetryEvent::ProviderUpdated {
                    provider_id: sender,
                    previous_name: previous_name.clone(),
                    name,
                    channel_count,
                }
            }
        };

        self.publisher.publish(event);
        self.announcements.notify_waiters();
        outcome
    }

    /// Evict a provider that withdrew its channels.
    pub fn handle_clear(&self, sender: ProviderId) -> Option<Provider> {
        let cleared = self.registry.clear(sender);
        self.sequences.forget(sender);

        match &cleared {
            Some(provider) => {
                info!(provider_id = %sender, name = %provider.name, "Provider cleared");
                self.publisher.publish(TelemetryEvent::ProviderCleared {
                    provider_id: sender,
                    name: provider.name.clone(),
                    reason: ClearReason::Explicit,
                });
            }
            None => debug!(provider_id = %sender, "Clear for unknown provider ignored"),
        }
        cleared
    }

    /// Answer a ping addressed to this node (or broadcast).
    ///
    /// Returns whether a pong was sent.
    pub async fn handle_ping(&self, header: &MessageHeader, source: SocketAddr) -> bool {
        if !header.is_addressed_to(self.registry.node_id()) {
            return false;
        }
        match self
            .send(&MessageBody::Pong, header.sender, SendTarget::Unicast(source))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(provider_id = %header.sender, error = %err, "Failed to answer ping");
                false
            }
        }
    }
}
