use std::time::Duration;

/// Thresholds for channel and pipeline health.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Age of the last sample at which a channel turns stale.
    pub stale_after: Duration,
    /// Rolling window for rate and invalid-ratio estimates.
    pub rate_window: Duration,
    /// Below this a channel is critical.
    pub min_rate_hz: f64,
    /// Below this a channel is a warning.
    pub target_rate_hz: f64,
    pub critical_invalid_ratio: f64,
    /// Frame drop ratio above which the pipeline is at least a warning.
    pub drop_ratio_threshold: f64,
    /// Hard cap on samples retained per channel window.
    pub max_window_samples: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(2),
            rate_window: Duration::from_secs(2),
            min_rate_hz: 5.0,
            target_rate_hz: 10.0,
            critical_invalid_ratio: 0.25,
            drop_ratio_threshold: 0.10,
            max_window_samples: 4_096,
        }
    }
}

impl ValidatorConfig {
    pub fn for_testing() -> Self {
        Self {
            max_window_samples: 256,
            ..Self::default()
        }
    }
}
