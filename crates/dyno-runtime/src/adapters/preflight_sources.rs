//! Feeds the preflight engine from the live registry and validator.

use std::sync::Arc;

use dl_03_provider_discovery::ProviderRegistry;
use dl_05_channel_validator::{ChannelHealth, ChannelValidator, FrameStatsSnapshot};
use dl_06_preflight::PreflightSources;
use shared_types::{Provider, ProviderId, TimeSource, Timestamp};

pub struct PipelineSources {
    registry: Arc<ProviderRegistry>,
    validator: Arc<ChannelValidator>,
    time_source: Arc<dyn TimeSource>,
}

impl PipelineSources {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        validator: Arc<ChannelValidator>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            registry,
            validator,
            time_source,
        }
    }
}

impl PreflightSources for PipelineSources {
    fn providers(&self) -> Vec<Provider> {
        self.registry.snapshot()
    }

    fn channel_health(&self, provider: ProviderId) -> Vec<ChannelHealth> {
        self.validator.channel_health(Some(provider))
    }

    fn frame_stats(&self) -> FrameStatsSnapshot {
        self.validator.frames().snapshot()
    }

    fn now(&self) -> Timestamp {
        self.time_source.now()
    }
}
