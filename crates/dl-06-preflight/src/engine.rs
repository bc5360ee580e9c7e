//! Gathers preflight inputs over real time and evaluates them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dl_05_channel_validator::{ChannelHealth, FrameStatsSnapshot};
use shared_bus::{EventFilter, EventTopic, InMemoryEventBus, TelemetryEvent};
use shared_types::{Provider, ProviderId, Timestamp};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::PreflightConfig;
use crate::evaluate::{evaluate, select_provider, PreflightInput};
use crate::result::{PreflightMode, PreflightResult};
use crate::semantic::SampleWindow;

/// Read access to registry and validator state.
pub trait PreflightSources: Send + Sync {
    fn providers(&self) -> Vec<Provider>;
    fn channel_health(&self, provider: ProviderId) -> Vec<ChannelHealth>;
    fn frame_stats(&self) -> FrameStatsSnapshot;
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightRequest {
    /// `None` auto-selects a provider.
    pub provider: Option<ProviderId>,
    pub mode: PreflightMode,
    /// Overrides the configured active sampling window.
    pub sample_window: Option<Duration>,
}

impl PreflightRequest {
    pub fn blocking(provider: Option<ProviderId>) -> Self {
        Self {
            provider,
            mode: PreflightMode::Blocking,
            sample_window: None,
        }
    }

    pub fn advisory(provider: Option<ProviderId>) -> Self {
        Self {
            provider,
            mode: PreflightMode::Advisory,
            sample_window: None,
        }
    }

    pub fn with_sample_window(mut self, window: Duration) -> Self {
        self.sample_window = Some(window);
        self
    }
}

pub struct PreflightEngine {
    config: PreflightConfig,
    sources: Arc<dyn PreflightSources>,
    bus: Arc<InMemoryEventBus>,
}

/// Resolves once `cancel` reads `true`; never if its sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl PreflightEngine {
    pub fn new(
        config: PreflightConfig,
        sources: Arc<dyn PreflightSources>,
        bus: Arc<InMemoryEventBus>,
    ) -> Self {
        Self {
            config,
            sources,
            bus,
        }
    }

    pub fn config(&self) -> &PreflightConfig {
        &self.config
    }

    /// Run all stages: a passive window for health, then an active window
    /// collecting the provider's samples.
    ///
    /// Cancellation ends the current window early; the remaining stages are
    /// evaluated on what was gathered and the result is flagged incomplete.
    pub async fn run(
        &self,
        request: PreflightRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> PreflightResult {
        let providers = self.sources.providers();
        let Some(selected) = select_provider(request.provider, &providers, &self.config).map(|p| p.id)
        else {
            info!(requested = ?request.provider, "Preflight found no provider");
            return self.finish(request, None, &[], &SampleWindow::new(), false);
        };
        info!(provider_id = %selected, mode = ?request.mode, "Preflight started");

        let mut incomplete = false;

        let passive_end = Instant::now() + self.config.passive_window;
        tokio::select! {
            _ = sleep_until(passive_end) => {}
            _ = cancelled(&mut cancel) => incomplete = true,
        }
        let health = self.sources.channel_health(selected);

        let mut samples = SampleWindow::new();
        if !incomplete {
            let window = request.sample_window.unwrap_or(self.config.sample_window);
            incomplete = self.collect(selected, window, &mut samples, &mut cancel).await;
        }

        if incomplete {
            warn!(provider_id = %selected, samples = samples.len(), "Preflight cancelled");
        }

        let providers = self.sources.providers();
        let provider = providers.iter().find(|p| p.id == selected);
        let request = PreflightRequest {
            provider: Some(selected),
            ..request
        };
        self.finish(request, provider, &health, &samples, incomplete)
    }

    /// Collect samples for `window`. Returns `true` if cancelled.
    async fn collect(
        &self,
        provider: ProviderId,
        window: Duration,
        samples: &mut SampleWindow,
        cancel: &mut watch::Receiver<bool>,
    ) -> bool {
        let mut subscription = self
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Samples]).for_provider(provider));
        let deadline = Instant::now() + window;

        let cancelled_early = loop {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(TelemetryEvent::SamplePosted(sample)) => samples.push(&sample),
                    Some(_) => {}
                    None => break false,
                },
                _ = sleep_until(deadline) => break false,
                _ = cancelled(cancel) => break true,
            }
        };

        if subscription.lagged() > 0 {
            warn!(
                provider_id = %provider,
                lagged = subscription.lagged(),
                "Preflight sampling fell behind the event bus"
            );
        }
        debug!(provider_id = %provider, samples = samples.len(), "Sampling window closed");
        cancelled_early
    }

    fn finish(
        &self,
        request: PreflightRequest,
        provider: Option<&Provider>,
        health: &[ChannelHealth],
        samples: &SampleWindow,
        incomplete: bool,
    ) -> PreflightResult {
        let input = PreflightInput {
            requested: request.provider,
            provider,
            now: self.sources.now(),
            channel_health: health,
            frames: self.sources.frame_stats(),
            samples,
            mode: request.mode,
            incomplete,
            evaluated_at: Utc::now(),
        };
        let result = evaluate(&input, &self.config);

        info!(
            provider_id = ?result.provider_id,
            passed = result.passed,
            failed_checks = result.failed_checks().count(),
            incomplete,
            "Preflight finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared_bus::EventPublisher;
    use shared_types::{ChannelId, ChannelInfo, ChannelKey, Sample, Unit};
    use std::collections::BTreeMap;
    use std::net::SocketAddr;

    struct StaticSources {
        providers: Mutex<Vec<Provider>>,
    }

    impl PreflightSources for StaticSources {
        fn providers(&self) -> Vec<Provider> {
            self.providers.lock().clone()
        }
        fn channel_health(&self, _provider: ProviderId) -> Vec<ChannelHealth> {
            Vec::new()
        }
        fn frame_stats(&self) -> FrameStatsSnapshot {
            FrameStatsSnapshot::default()
        }
        fn now(&self) -> Timestamp {
            Timestamp(1_000)
        }
    }

    fn provider(channels: &[(u16, &str, Unit)]) -> Provider {
        Provider {
            id: ProviderId(0x10),
            address: SocketAddr::from(([10, 0, 0, 2], 22344)),
            name: "dyno".into(),
            channels: channels
                .iter()
                .map(|&(c, name, unit)| (ChannelId(c), ChannelInfo::new(ChannelId(c), name, unit)))
                .collect::<BTreeMap<_, _>>(),
            first_seen: Timestamp(0),
            last_seen: Timestamp(900),
            announcements: 1,
        }
    }

    fn engine(providers: Vec<Provider>) -> (PreflightEngine, Arc<InMemoryEventBus>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let sources = Arc::new(StaticSources {
            providers: Mutex::new(providers),
        });
        (
            PreflightEngine::new(PreflightConfig::for_testing(), sources, bus.clone()),
            bus,
        )
    }

    #[tokio::test]
    async fn test_no_provider_returns_immediately() {
        let (engine, _bus) = engine(Vec::new());
        let (_tx, rx) = watch::channel(false);
        let result = engine.run(PreflightRequest::blocking(None), rx).await;
        assert!(!result.passed);
        assert!(!result.incomplete);
        assert_eq!(result.checks.len(), 1);
    }

    #[tokio::test]
    async fn test_collects_posted_samples() {
        let p = provider(&[(1, "RPM", Unit::EngineSpeed), (2, "AFR", Unit::Afr)]);
        let (engine, bus) = engine(vec![p]);
        let (_tx, rx) = watch::channel(false);

        let publisher = tokio::spawn(async move {
            for i in 0..40u64 {
                for (channel, value) in [(1, 3_000.0 + i as f32), (2, 14.0)] {
                    bus.publish(TelemetryEvent::SamplePosted(Sample {
                        key: ChannelKey::new(ProviderId(0x10), ChannelId(channel)),
                        timestamp: Timestamp(i * 10),
                        value,
                        locally_timestamped: false,
                        received_at: Timestamp(i * 10),
                    }));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let result = engine.run(PreflightRequest::blocking(None), rx).await;
        publisher.await.unwrap();

        assert!(result.passed);
        assert_eq!(result.provider_id, Some(ProviderId(0x10)));
        let rpm_range = result.check("RPM range").unwrap();
        assert!(rpm_range.passed, "{}", rpm_range.message);
        assert!(result.check("RPM frozen").unwrap().passed);
        // AFR is constant in this stream
        assert!(!result.check("AFR frozen").unwrap().passed);
    }

    #[tokio::test]
    async fn test_cancellation_flags_incomplete() {
        let p = provider(&[(1, "RPM", Unit::EngineSpeed)]);
        let (engine, _bus) = engine(vec![p]);
        let (tx, rx) = watch::channel(false);

        let request = PreflightRequest::advisory(Some(ProviderId(0x10)))
            .with_sample_window(Duration::from_secs(60));
        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), engine.run(request, rx))
            .await
            .unwrap();
        cancel.await.unwrap();

        assert!(result.incomplete);
        assert!(!result.passed);
        assert!(result.can_override);
    }
}
