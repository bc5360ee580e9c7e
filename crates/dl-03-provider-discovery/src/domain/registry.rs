//! The live provider catalog.
//!
//! One lock-guarded map keyed by provider id. Every mutation is a single
//! critical section, so readers never see a half-replaced channel map and a
//! clear always captures the name that was current at eviction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;

use dl_01_wire_codec::Announcement;
use parking_lot::RwLock;
use rand::Rng;
use shared_types::{ChannelInfo, ChannelKey, Provider, ProviderId, Timestamp};
use tracing::info;

use super::errors::DiscoveryError;

/// Random draws before falling back to a linear scan for a free node id.
const RANDOM_NODE_ID_ATTEMPTS: usize = 1024;

/// What an announcement did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceOutcome {
    Discovered,
    /// Name and channel map were replaced.
    Updated { previous_name: String },
}

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderId, Provider>>,
    /// This node's own sender id, if assigned.
    node_id: RwLock<Option<ProviderId>>,
    /// Every sender id ever observed, including evicted ones.
    seen: RwLock<HashSet<ProviderId>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_id(node_id: ProviderId) -> Result<Self, DiscoveryError> {
        let registry = Self::new();
        registry.assign_node_id(node_id)?;
        Ok(registry)
    }

    // =========================================================================
    // NODE IDENTITY
    // =========================================================================

    pub fn node_id(&self) -> Option<ProviderId> {
        *self.node_id.read()
    }

    pub fn assign_node_id(&self, node_id: ProviderId) -> Result<(), DiscoveryError> {
        if node_id.is_broadcast() {
            return Err(DiscoveryError::InvalidNodeId(node_id.value()));
        }
        *self.node_id.write() = Some(node_id);
        info!(node_id = %node_id, "Node id assigned");
        Ok(())
    }

    /// Pick and assign a random id that no observed sender uses and that is
    /// not the broadcast id.
    pub fn assign_random_node_id<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<ProviderId, DiscoveryError> {
        let chosen = {
            let seen = self.seen.read();
            let free = |id: ProviderId| !id.is_broadcast() && !seen.contains(&id);

            (0..RANDOM_NODE_ID_ATTEMPTS)
                .map(|_| ProviderId(rng.gen()))
                .find(|id| free(*id))
                .or_else(|| (0..u16::MAX).map(ProviderId).find(|id| free(*id)))
        };

        let node_id = chosen.ok_or(DiscoveryError::NodeIdSpaceExhausted)?;
        self.assign_node_id(node_id)?;
        Ok(node_id)
    }

    /// Whether `sender` is this node. Never true while no id is assigned.
    pub fn is_self(&self, sender: ProviderId) -> bool {
        self.node_id() == Some(sender)
    }

    /// Remember a sender id so random node id selection avoids it.
    pub fn observe_sender(&self, sender: ProviderId) {
        if self.seen.read().contains(&sender) {
            return;
        }
        self.seen.write().insert(sender);
    }

    pub fn has_seen(&self, sender: ProviderId) -> bool {
        self.seen.read().contains(&sender)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Replace (never merge) the provider's name and channel set.
    pub fn apply_announcement(
        &self,
        id: ProviderId,
        address: SocketAddr,
        announcement: Announcement,
        now: Timestamp,
    ) -> AnnounceOutcome {
        self.observe_sender(id);

        let channels: BTreeMap<_, _> = announcement
            .channels
            .into_iter()
            .map(|channel| (channel.id, channel))
            .collect();

        let mut providers = self.providers.write();
        match providers.get_mut(&id) {
            Some(provider) => {
                let previous_name = std::mem::replace(&mut provider.name, announcement.name);
                provider.channels = channels;
                provider.address = address;
                provider.last_seen = now;
                provider.announcements += 1;
                AnnounceOutcome::Updated { previous_name }
            }
            None => {
                providers.insert(
                    id,
                    Provider {
                        id,
                        address,
                        name: announcement.name,
                        channels,
                        first_seen: now,
                        last_seen: now,
                        announcements: 1,
                    },
                );
                AnnounceOutcome::Discovered
            }
        }
    }

    /// Evict a provider, returning it as it was at the moment of removal.
    pub fn clear(&self, id: ProviderId) -> Option<Provider> {
        self.providers.write().remove(&id)
    }

    /// Refresh last-seen. Returns `false` for unknown providers.
    pub fn touch(&self, id: ProviderId, now: Timestamp) -> bool {
        match self.providers.write().get_mut(&id) {
            Some(provider) => {
                provider.last_seen = provider.last_seen.max(now);
                true
            }
            None => false,
        }
    }

    /// Evict every provider silent for at least `timeout`.
    pub fn expire(&self, now: Timestamp, timeout: Duration) -> Vec<Provider> {
        let mut providers = self.providers.write();
        let stale: Vec<ProviderId> = providers
            .values()
            .filter(|p| now.saturating_duration_since(p.last_seen) >= timeout)
            .map(|p| p.id)
            .collect();

        let mut evicted: Vec<Provider> = stale
            .into_iter()
            .filter_map(|id| providers.remove(&id))
            .collect();
        evicted.sort_by_key(|p| p.id);
        evicted
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn get(&self, id: ProviderId) -> Option<Provider> {
        self.providers.read().get(&id).cloned()
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.providers.read().contains_key(&id)
    }

    pub fn channel(&self, key: ChannelKey) -> Option<ChannelInfo> {
        self.providers
            .read()
            .get(&key.provider)
            .and_then(|p| p.channel(key.channel).cloned())
    }

    /// All providers, ordered by id.
    pub fn snapshot(&self) -> Vec<Provider> {
        let mut providers: Vec<_> = self.providers.read().values().cloned().collect();
        providers.sort_by_key(|p| p.id);
        providers
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}
