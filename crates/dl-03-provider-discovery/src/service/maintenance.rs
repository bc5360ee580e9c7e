use shared_bus::{ClearReason, TelemetryEvent};
use shared_types::Provider;
use tracing::info;

use crate::service::DiscoveryService;

impl DiscoveryService {
    /// Evict providers silent for longer than the provider timeout.
    ///
    /// Call from a timer task every `maintenance_interval`.
    pub fn expire_stale(&self) -> Vec<Provider> {
        let evicted = self
            .registry
            .expire(self.now(), self.config.provider_timeout);

        for provider in &evicted {
            self.sequences.forget(provider.id);
            info!(
                provider_id = %provider.id,
                name = %provider.name,
                timeout_ms = self.config.provider_timeout.as_millis() as u64,
                "Provider timed out"
            );
            self.publisher.publish(TelemetryEvent::ProviderCleared {
                provider_id: provider.id,
                name: provider.name.clone(),
                reason: ClearReason::Timeout,
            });
        }
        evicted
    }
}
