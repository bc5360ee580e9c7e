//! Channel and pipeline health classification.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::{ChannelKey, Timestamp, Unit};

use crate::config::ValidatorConfig;
use crate::frames::FrameStatsSnapshot;
use crate::metrics::ChannelMetricsSnapshot;

/// Ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Stale,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Stale => "stale",
            HealthStatus::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelHealth {
    pub key: ChannelKey,
    pub name: String,
    pub unit: Unit,
    pub status: HealthStatus,
    /// Time since the last sample; `None` if never sampled.
    pub age_ms: Option<u64>,
    pub rate_hz: f64,
    pub invalid_ratio: f64,
    pub reason: String,
}

/// Classify one channel, worst condition first.
pub fn classify_channel(
    snapshot: &ChannelMetricsSnapshot,
    now: Timestamp,
    config: &ValidatorConfig,
) -> ChannelHealth {
    let age = snapshot
        .last_received_at
        .map(|at| now.saturating_duration_since(at));

    let (status, reason) = match age {
        None => (HealthStatus::Stale, "no samples received".to_string()),
        Some(age) if age >= config.stale_after => (
            HealthStatus::Stale,
            format!("last sample {}ms ago", age.as_millis()),
        ),
        Some(_) if snapshot.invalid_ratio >= config.critical_invalid_ratio => (
            HealthStatus::Critical,
            format!("{:.0}% invalid values", snapshot.invalid_ratio * 100.0),
        ),
        Some(_) if snapshot.rate_hz < config.min_rate_hz => (
            HealthStatus::Critical,
            format!(
                "rate {:.1}/s below minimum {:.1}/s",
                snapshot.rate_hz, config.min_rate_hz
            ),
        ),
        Some(_) if snapshot.rate_hz < config.target_rate_hz => (
            HealthStatus::Warning,
            format!(
                "rate {:.1}/s below target {:.1}/s",
                snapshot.rate_hz, config.target_rate_hz
            ),
        ),
        Some(_) if snapshot.invalid_ratio > 0.0 => (
            HealthStatus::Warning,
            format!("{:.0}% invalid values", snapshot.invalid_ratio * 100.0),
        ),
        Some(_) => (HealthStatus::Healthy, "ok".to_string()),
    };

    ChannelHealth {
        key: snapshot.key,
        name: snapshot.name.clone(),
        unit: snapshot.unit,
        status,
        age_ms: age.map(|a| a.as_millis() as u64),
        rate_hz: snapshot.rate_hz,
        invalid_ratio: snapshot.invalid_ratio,
        reason,
    }
}

/// Combine channel statuses into one pipeline status.
///
/// No channels at all reads as stale.
pub fn overall_status(
    channels: &[ChannelHealth],
    frames: &FrameStatsSnapshot,
    config: &ValidatorConfig,
) -> HealthStatus {
    let count = |status| channels.iter().filter(|c| c.status == status).count();

    let base = if channels.is_empty() {
        HealthStatus::Stale
    } else if count(HealthStatus::Critical) > 0 {
        HealthStatus::Critical
    } else if count(HealthStatus::Stale) * 2 > channels.len() {
        HealthStatus::Stale
    } else if count(HealthStatus::Warning) > 0 || count(HealthStatus::Stale) > 0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    if frames.drop_ratio() > config.drop_ratio_threshold {
        base.max(HealthStatus::Warning)
    } else {
        base
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineHealth {
    pub status: HealthStatus,
    pub channels: Vec<ChannelHealth>,
    pub frames: FrameStatsSnapshot,
    pub drop_ratio: f64,
    pub evaluated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ChannelId, ProviderId};

    fn snapshot(last: Option<u64>, rate: f64, invalid: f64) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            key: ChannelKey::new(ProviderId(1), ChannelId(1)),
            name: "RPM".into(),
            unit: Unit::EngineSpeed,
            last_value: Some(1.0),
            last_timestamp: last.map(Timestamp),
            last_received_at: last.map(Timestamp),
            locally_timestamped: false,
            rate_hz: rate,
            invalid_ratio: invalid,
            invalid_count: 0,
            total_count: 10,
        }
    }

    fn status(last: Option<u64>, rate: f64, invalid: f64) -> HealthStatus {
        classify_channel(
            &snapshot(last, rate, invalid),
            Timestamp(10_000),
            &ValidatorConfig::default(),
        )
        .status
    }

    fn channel(status: HealthStatus) -> ChannelHealth {
        let mut c = classify_channel(
            &snapshot(Some(10_000), 20.0, 0.0),
            Timestamp(10_000),
            &ValidatorConfig::default(),
        );
        c.status = status;
        c
    }

    #[test]
    fn test_channel_classification_order() {
        assert_eq!(status(None, 0.0, 0.0), HealthStatus::Stale);
        assert_eq!(status(Some(8_000), 50.0, 0.0), HealthStatus::Stale);
        assert_eq!(status(Some(8_001), 50.0, 0.0), HealthStatus::Healthy);
        assert_eq!(status(Some(9_900), 50.0, 0.5), HealthStatus::Critical);
        assert_eq!(status(Some(9_900), 4.0, 0.0), HealthStatus::Critical);
        assert_eq!(status(Some(9_900), 8.0, 0.0), HealthStatus::Warning);
        assert_eq!(status(Some(9_900), 20.0, 0.1), HealthStatus::Warning);
        assert_eq!(status(Some(9_900), 20.0, 0.0), HealthStatus::Healthy);
    }

    #[test]
    fn test_stale_wins_over_invalid_history() {
        assert_eq!(status(Some(7_000), 0.0, 1.0), HealthStatus::Stale);
    }

    #[test]
    fn test_overall_rules() {
        let config = ValidatorConfig::default();
        let frames = FrameStatsSnapshot::default();
        use HealthStatus::*;

        assert_eq!(overall_status(&[], &frames, &config), Stale);
        assert_eq!(
            overall_status(&[channel(Healthy), channel(Critical), channel(Stale)], &frames, &config),
            Critical
        );
        assert_eq!(
            overall_status(&[channel(Stale), channel(Stale), channel(Healthy)], &frames, &config),
            Stale
        );
        assert_eq!(
            overall_status(&[channel(Stale), channel(Healthy)], &frames, &config),
            Warning
        );
        assert_eq!(
            overall_status(&[channel(Healthy), channel(Healthy)], &frames, &config),
            Healthy
        );
    }

    #[test]
    fn test_drop_ratio_downgrades_to_warning() {
        let config = ValidatorConfig::default();
        let frames = FrameStatsSnapshot {
            total: 100,
            malformed: 11,
            ..Default::default()
        };
        assert_eq!(
            overall_status(&[channel(HealthStatus::Healthy)], &frames, &config),
            HealthStatus::Warning
        );
        assert_eq!(
            overall_status(&[channel(HealthStatus::Critical)], &frames, &config),
            HealthStatus::Critical
        );
    }
}
