//! Periodic eviction of silent providers.

use std::sync::Arc;

use dl_03_provider_discovery::cancelled;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::wiring::FramePipeline;

/// Evict providers silent past the provider timeout, then drop their
/// validator metrics and time basis.
pub async fn run_maintenance(pipeline: Arc<FramePipeline>, mut shutdown: watch::Receiver<bool>) {
    let discovery = Arc::clone(&pipeline.container().discovery);
    let mut interval = tokio::time::interval(discovery.config().maintenance_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for provider in discovery.expire_stale() {
                    pipeline.forget(provider.id);
                }
            }
            _ = cancelled(&mut shutdown) => break,
        }
    }
    debug!("Maintenance stopped");
}
