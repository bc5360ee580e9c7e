//! Scoped channel validation: per-key metrics, capture sessions and health.

use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{ChannelInfo, ChannelKey, Provider, ProviderId, Sample, TimeSource};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ValidatorConfig;
use crate::frames::FrameStats;
use crate::health::{classify_channel, overall_status, ChannelHealth, PipelineHealth};
use crate::metrics::ChannelMetricsSnapshot;
use crate::ranges::UnitRanges;
use crate::session::{CaptureSession, CaptureSummary, MetricsTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Valid,
    /// Counted as invalid (non-finite or outside the unit's range).
    Invalid,
    /// Belongs to a provider other than the active session's.
    OutOfScope,
}

/// Owns channel metrics and answers health queries.
///
/// Outside a capture session every provider's channels are observed (what
/// preflight reads). During a session only the session provider's keys are
/// recorded, into metrics owned by the [`CaptureSession`].
pub struct ChannelValidator {
    config: ValidatorConfig,
    ranges: UnitRanges,
    time_source: Arc<dyn TimeSource>,
    idle: MetricsTable,
    session: RwLock<Option<Arc<CaptureSession>>>,
    frames: FrameStats,
}

impl ChannelValidator {
    pub fn new(config: ValidatorConfig, ranges: UnitRanges, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            ranges,
            time_source,
            idle: MetricsTable::default(),
            session: RwLock::new(None),
            frames: FrameStats::new(),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameStats {
        &self.frames
    }

    pub fn session(&self) -> Option<Arc<CaptureSession>> {
        self.session.read().clone()
    }

    /// Record one reconciled sample of a declared channel.
    pub fn record(&self, sample: &Sample, info: &ChannelInfo) -> RecordOutcome {
        let session = self.session();
        let table = match session.as_deref() {
            Some(active) if active.provider != sample.key.provider => {
                return RecordOutcome::OutOfScope;
            }
            Some(active) => &active.metrics,
            None => &self.idle,
        };

        let valid = self.ranges.is_valid(info.unit, sample.value);
        let entry = table.entry(sample.key, info);
        entry.lock().record(
            sample,
            valid,
            self.config.rate_window,
            self.config.max_window_samples,
        );

        if valid {
            RecordOutcome::Valid
        } else {
            debug!(key = %sample.key, value = sample.value, unit = %info.unit, "Invalid value");
            RecordOutcome::Invalid
        }
    }

    /// Sync metric entries with `provider`'s latest announcement.
    pub fn declare_provider(&self, provider: &Provider) {
        match self.session() {
            Some(active) if active.provider == provider.id => active.metrics.declare(provider),
            Some(_) => {}
            None => self.idle.declare(provider),
        }
    }

    /// Drop pre-capture metrics of a provider that left.
    pub fn forget_provider(&self, provider: ProviderId) {
        self.idle.forget(provider);
    }

    /// Start a capture session with fresh metrics for `provider`'s channels.
    pub fn begin_session(&self, session_id: Uuid, provider: &Provider) -> Arc<CaptureSession> {
        let session = Arc::new(CaptureSession::new(
            session_id,
            provider,
            self.time_source.now(),
        ));

        let previous = self.session.write().replace(Arc::clone(&session));
        if let Some(previous) = previous {
            warn!(session_id = %previous.session_id, "Replacing capture session that was never stopped");
        }
        self.idle.clear();

        info!(
            session_id = %session_id,
            provider_id = %provider.id,
            channels = provider.channels.len(),
            "Capture session started"
        );
        session
    }

    /// Stop the active session and return its final metrics.
    pub fn end_session(&self) -> Option<CaptureSummary> {
        let session = self.session.write().take()?;
        let now = self.time_source.now();
        let channels = session
            .metrics
            .snapshots(None, now, self.config.rate_window);

        info!(
            session_id = %session.session_id,
            provider_id = %session.provider,
            channels = channels.len(),
            "Capture session stopped"
        );
        Some(CaptureSummary {
            session_id: session.session_id,
            provider: session.provider,
            started_at: session.started_at,
            stopped_at: now,
            channels,
        })
    }

    pub fn metrics_snapshot(&self, key: ChannelKey) -> Option<ChannelMetricsSnapshot> {
        let now = self.time_source.now();
        let window = self.config.rate_window;
        let metrics = match self.session() {
            Some(active) => active.metrics.get(key),
            None => self.idle.get(key),
        };
        metrics.map(|m| m.lock().snapshot(now, window))
    }

    pub fn metrics_snapshots(&self, provider: Option<ProviderId>) -> Vec<ChannelMetricsSnapshot> {
        let now = self.time_source.now();
        let window = self.config.rate_window;
        match self.session() {
            Some(active) => active.metrics.snapshots(provider, now, window),
            None => self.idle.snapshots(provider, now, window),
        }
    }

    /// Classified health per channel, recomputed on every call.
    pub fn channel_health(&self, provider: Option<ProviderId>) -> Vec<ChannelHealth> {
        let now = self.time_source.now();
        self.metrics_snapshots(provider)
            .iter()
            .map(|snapshot| classify_channel(snapshot, now, &self.config))
            .collect()
    }

    pub fn pipeline_health(&self) -> PipelineHealth {
        let channels = self.channel_health(None);
        let frames = self.frames.snapshot();
        PipelineHealth {
            status: overall_status(&channels, &frames, &self.config),
            drop_ratio: frames.drop_ratio(),
            channels,
            frames,
            evaluated_at: self.time_source.now(),
        }
    }
}
