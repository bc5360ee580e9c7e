use std::time::Duration;

use crate::signals::SignalSpec;

/// Cross-signal check: `power ≈ torque × rpm / constant`.
#[derive(Debug, Clone)]
pub struct CrossSignalConfig {
    /// 5252 for lb·ft / hp. Metric rigs (N·m, kW) use 9549.
    pub constant: f64,
    /// Accepted median relative error.
    pub tolerance: f64,
    /// Samples of the three signals are aligned into bins of this width.
    pub bin: Duration,
    /// Bins below this engine speed are ignored.
    pub min_rpm: f64,
    /// Fewer usable bins than this and the check is inconclusive.
    pub min_bins: usize,
}

impl Default for CrossSignalConfig {
    fn default() -> Self {
        Self {
            constant: 5252.0,
            tolerance: 0.15,
            bin: Duration::from_millis(100),
            min_rpm: 1_000.0,
            min_bins: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreflightConfig {
    /// A provider not heard from within this is unresponsive.
    pub discovery_timeout: Duration,
    /// Wait before reading channel health (stage 4).
    pub passive_window: Duration,
    /// Default active sampling window (stage 5).
    pub sample_window: Duration,
    pub required: Vec<SignalSpec>,
    pub recommended: Vec<SignalSpec>,
    /// Required channels must have a sample younger than this.
    pub max_sample_age: Duration,
    /// Required channels must stream faster than this.
    pub min_rate_hz: f64,
    pub max_drop_ratio: f64,
    pub cross_signal: CrossSignalConfig,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(3),
            passive_window: Duration::from_secs(3),
            sample_window: Duration::from_secs(15),
            required: vec![SignalSpec::rpm(), SignalSpec::afr()],
            recommended: vec![
                SignalSpec::map(),
                SignalSpec::tps(),
                SignalSpec::torque(),
                SignalSpec::power(),
            ],
            max_sample_age: Duration::from_secs(2),
            min_rate_hz: 5.0,
            max_drop_ratio: 0.10,
            cross_signal: CrossSignalConfig::default(),
        }
    }
}

impl PreflightConfig {
    pub fn for_testing() -> Self {
        Self {
            passive_window: Duration::from_millis(50),
            sample_window: Duration::from_millis(200),
            ..Self::default()
        }
    }

    /// The recommended spec labelled `label`, e.g. "Torque".
    pub(crate) fn recommended_spec(&self, label: &str) -> Option<&SignalSpec> {
        self.recommended.iter().find(|spec| spec.label == label)
    }

    pub(crate) fn required_spec(&self, label: &str) -> Option<&SignalSpec> {
        self.required.iter().find(|spec| spec.label == label)
    }
}
