use std::time::Duration;

use shared_types::ProviderId;

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long `discover` listens, and how long `connect` waits for a
    /// fresh announcement.
    pub discovery_timeout: Duration,
    /// Silence after which maintenance evicts a provider.
    pub provider_timeout: Duration,
    /// Broadcast a channel-info request before listening.
    pub request_on_discover: bool,
    /// Period of the eviction sweep.
    pub maintenance_interval: Duration,
    /// Fixed node id; a random free id is chosen when unset.
    pub node_id: Option<ProviderId>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(3),
            provider_timeout: Duration::from_secs(10),
            request_on_discover: true,
            maintenance_interval: Duration::from_secs(1),
            node_id: None,
        }
    }
}

impl DiscoveryConfig {
    /// Short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            discovery_timeout: Duration::from_millis(200),
            provider_timeout: Duration::from_millis(500),
            request_on_discover: true,
            maintenance_interval: Duration::from_millis(50),
            node_id: Some(ProviderId(0x0FFE)),
        }
    }
}
