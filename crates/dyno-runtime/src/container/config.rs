//! # Runtime Configuration
//!
//! Unified configuration for every subsystem, loaded from TOML.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file: explicit path, else `DL_CONFIG`
//! 3. Environment: `DL_MULTICAST_GROUP`, `DL_MULTICAST_PORT`, `DL_NODE_ID`
//!
//! Every field is optional. Durations are integer milliseconds (`*_ms`).

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dl_03_provider_discovery::{DiscoveryConfig, MulticastConfig, DEFAULT_GROUP, DEFAULT_PORT};
use dl_05_channel_validator::ValidatorConfig;
use dl_06_preflight::{CrossSignalConfig, PreflightConfig, PreflightMode};
use dl_07_reliability::{
    CircuitBreakerConfig, MonitorConfig, QueueConfig, ReliabilityConfig,
};
use serde::{Deserialize, Serialize};
use shared_types::ProviderId;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "DL_CONFIG";
pub const MULTICAST_GROUP_ENV: &str = "DL_MULTICAST_GROUP";
pub const MULTICAST_PORT_ENV: &str = "DL_MULTICAST_PORT";
pub const NODE_ID_ENV: &str = "DL_NODE_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub network: NetworkSection,
    pub discovery: DiscoverySection,
    pub validator: ValidatorSection,
    pub preflight: PreflightSection,
    pub reliability: ReliabilitySection,
    pub runtime: RuntimeSection,
}

/// Multicast transport and node identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub group: Ipv4Addr,
    pub port: u16,
    pub interface: Ipv4Addr,
    pub ttl: u32,
    pub loopback: bool,
    /// Fixed node id; chosen randomly after the first discovery when unset.
    pub node_id: Option<u16>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        let multicast = MulticastConfig::default();
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: multicast.interface,
            ttl: multicast.ttl,
            loopback: multicast.loopback,
            node_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub discovery_timeout_ms: u64,
    pub provider_timeout_ms: u64,
    pub request_on_discover: bool,
    pub maintenance_interval_ms: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        let defaults = DiscoveryConfig::default();
        Self {
            discovery_timeout_ms: millis(defaults.discovery_timeout),
            provider_timeout_ms: millis(defaults.provider_timeout),
            request_on_discover: defaults.request_on_discover,
            maintenance_interval_ms: millis(defaults.maintenance_interval),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSection {
    pub stale_after_ms: u64,
    pub rate_window_ms: u64,
    pub min_rate_hz: f64,
    pub target_rate_hz: f64,
    pub critical_invalid_ratio: f64,
    pub drop_ratio_threshold: f64,
    pub max_window_samples: usize,
}

impl Default for ValidatorSection {
    fn default() -> Self {
        let defaults = ValidatorConfig::default();
        Self {
            stale_after_ms: millis(defaults.stale_after),
            rate_window_ms: millis(defaults.rate_window),
            min_rate_hz: defaults.min_rate_hz,
            target_rate_hz: defaults.target_rate_hz,
            critical_invalid_ratio: defaults.critical_invalid_ratio,
            drop_ratio_threshold: defaults.drop_ratio_threshold,
            max_window_samples: defaults.max_window_samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightSection {
    pub passive_window_ms: u64,
    pub sample_window_ms: u64,
    pub max_sample_age_ms: u64,
    pub min_rate_hz: f64,
    pub max_drop_ratio: f64,
    pub cross_signal_constant: f64,
    pub cross_signal_tolerance: f64,
    pub cross_signal_bin_ms: u64,
    pub cross_signal_min_rpm: f64,
    pub cross_signal_min_bins: usize,
}

impl Default for PreflightSection {
    fn default() -> Self {
        let defaults = PreflightConfig::default();
        let cross = defaults.cross_signal;
        Self {
            passive_window_ms: millis(defaults.passive_window),
            sample_window_ms: millis(defaults.sample_window),
            max_sample_age_ms: millis(defaults.max_sample_age),
            min_rate_hz: defaults.min_rate_hz,
            max_drop_ratio: defaults.max_drop_ratio,
            cross_signal_constant: cross.constant,
            cross_signal_tolerance: cross.tolerance,
            cross_signal_bin_ms: millis(cross.bin),
            cross_signal_min_rpm: cross.min_rpm,
            cross_signal_min_bins: cross.min_bins,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilitySection {
    pub failure_threshold: u32,
    /// Omit to disable ratio tripping.
    pub failure_ratio: Option<f64>,
    pub min_calls: usize,
    pub window_size: usize,
    pub open_timeout_ms: u64,
    pub monitor_window: usize,
    pub latency_threshold_ms: u64,
    pub queue_capacity: usize,
    pub queue_alert_watermark: f64,
    pub alert_capacity: usize,
}

impl Default for ReliabilitySection {
    fn default() -> Self {
        let defaults = ReliabilityConfig::default();
        Self {
            failure_threshold: defaults.breaker.failure_threshold,
            failure_ratio: defaults.breaker.failure_ratio,
            min_calls: defaults.breaker.min_calls,
            window_size: defaults.breaker.window_size,
            open_timeout_ms: millis(defaults.breaker.open_timeout),
            monitor_window: defaults.monitor.window,
            latency_threshold_ms: millis(defaults.monitor.latency_threshold),
            queue_capacity: defaults.queue.capacity,
            queue_alert_watermark: defaults.queue.alert_watermark,
            alert_capacity: defaults.alert_capacity,
        }
    }
}

/// Process-level behaviour of the binary and the pipeline tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Decode workers. Above one, each source address is pinned to a lane.
    pub workers: usize,
    pub event_bus_capacity: usize,
    pub health_log_interval_ms: u64,
    /// Refuse `start_session` without a preflight result.
    pub require_preflight: bool,
    pub auto_preflight: bool,
    pub preflight_mode: PreflightMode,
    pub auto_start_session: bool,
    /// Provider the binary targets; auto-selected when unset.
    pub provider: Option<u16>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            workers: 2,
            event_bus_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            health_log_interval_ms: 5_000,
            require_preflight: true,
            auto_preflight: true,
            preflight_mode: PreflightMode::Blocking,
            auto_start_session: false,
            provider: None,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Parse a node id as `0x`-prefixed hex or decimal.
pub fn parse_node_id(raw: &str) -> Result<u16, ConfigError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => raw.parse::<u16>(),
    };
    parsed.map_err(|e| invalid("network.node_id", format!("'{raw}': {e}")))
}

impl RuntimeConfig {
    /// Load from `path` (or `DL_CONFIG`), apply environment overrides and
    /// validate. With neither, defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides read through `lookup` (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(group) = lookup(MULTICAST_GROUP_ENV) {
            self.network.group = group
                .trim()
                .parse()
                .map_err(|e| invalid("network.group", format!("'{group}': {e}")))?;
        }
        if let Some(port) = lookup(MULTICAST_PORT_ENV) {
            self.network.port = port
                .trim()
                .parse()
                .map_err(|e| invalid("network.port", format!("'{port}': {e}")))?;
        }
        if let Some(node_id) = lookup(NODE_ID_ENV) {
            self.network.node_id = Some(parse_node_id(&node_id)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.network.group.is_multicast() {
            return Err(invalid(
                "network.group",
                format!("{} is not a multicast address", self.network.group),
            ));
        }
        if self.network.node_id.is_some_and(|id| ProviderId(id).is_broadcast()) {
            return Err(invalid("network.node_id", "0xFFFF is the broadcast id"));
        }
        if self.runtime.workers == 0 {
            return Err(invalid("runtime.workers", "at least one worker is required"));
        }
        if self.runtime.event_bus_capacity == 0 {
            return Err(invalid("runtime.event_bus_capacity", "must be positive"));
        }
        if self.reliability.queue_capacity == 0 {
            return Err(invalid("reliability.queue_capacity", "must be positive"));
        }
        let watermark = self.reliability.queue_alert_watermark;
        if !(watermark > 0.0 && watermark <= 1.0) {
            return Err(invalid(
                "reliability.queue_alert_watermark",
                format!("{watermark} is outside (0, 1]"),
            ));
        }
        if let Some(ratio) = self.reliability.failure_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(invalid(
                    "reliability.failure_ratio",
                    format!("{ratio} is outside (0, 1]"),
                ));
            }
        }
        if self.preflight.cross_signal_constant <= 0.0 {
            return Err(invalid("preflight.cross_signal_constant", "must be positive"));
        }
        if self.discovery.maintenance_interval_ms == 0 {
            return Err(invalid("discovery.maintenance_interval_ms", "must be positive"));
        }
        Ok(())
    }

    /// Short windows and a fixed node id for tests.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.network.node_id = Some(0x0FFE);
        config.discovery = DiscoverySection {
            discovery_timeout_ms: 300,
            provider_timeout_ms: 800,
            request_on_discover: true,
            maintenance_interval_ms: 50,
        };
        config.preflight.passive_window_ms = 100;
        config.preflight.sample_window_ms = 300;
        config.reliability.queue_capacity = 1_024;
        config.reliability.open_timeout_ms = 100;
        config.runtime.workers = 1;
        config.runtime.health_log_interval_ms = 100;
        config
    }

    // =========================================================================
    // SUBSYSTEM CONFIGS
    // =========================================================================

    pub fn node_id(&self) -> Option<ProviderId> {
        self.network.node_id.map(ProviderId)
    }

    pub fn multicast(&self) -> MulticastConfig {
        MulticastConfig {
            group: self.network.group,
            port: self.network.port,
            interface: self.network.interface,
            ttl: self.network.ttl,
            loopback: self.network.loopback,
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        let section = &self.discovery;
        DiscoveryConfig {
            discovery_timeout: Duration::from_millis(section.discovery_timeout_ms),
            provider_timeout: Duration::from_millis(section.provider_timeout_ms),
            request_on_discover: section.request_on_discover,
            maintenance_interval: Duration::from_millis(section.maintenance_interval_ms),
            node_id: self.node_id(),
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        let section = &self.validator;
        ValidatorConfig {
            stale_after: Duration::from_millis(section.stale_after_ms),
            rate_window: Duration::from_millis(section.rate_window_ms),
            min_rate_hz: section.min_rate_hz,
            target_rate_hz: section.target_rate_hz,
            critical_invalid_ratio: section.critical_invalid_ratio,
            drop_ratio_threshold: section.drop_ratio_threshold,
            max_window_samples: section.max_window_samples,
        }
    }

    pub fn preflight_config(&self) -> PreflightConfig {
        let section = &self.preflight;
        PreflightConfig {
            discovery_timeout: Duration::from_millis(self.discovery.discovery_timeout_ms),
            passive_window: Duration::from_millis(section.passive_window_ms),
            sample_window: Duration::from_millis(section.sample_window_ms),
            max_sample_age: Duration::from_millis(section.max_sample_age_ms),
            min_rate_hz: section.min_rate_hz,
            max_drop_ratio: section.max_drop_ratio,
            cross_signal: CrossSignalConfig {
                constant: section.cross_signal_constant,
                tolerance: section.cross_signal_tolerance,
                bin: Duration::from_millis(section.cross_signal_bin_ms),
                min_rpm: section.cross_signal_min_rpm,
                min_bins: section.cross_signal_min_bins,
            },
            ..PreflightConfig::default()
        }
    }

    pub fn reliability_config(&self) -> ReliabilityConfig {
        let section = &self.reliability;
        ReliabilityConfig {
            breaker: CircuitBreakerConfig {
                failure_threshold: section.failure_threshold,
                failure_ratio: section.failure_ratio,
                min_calls: section.min_calls,
                window_size: section.window_size,
                open_timeout: Duration::from_millis(section.open_timeout_ms),
            },
            monitor: MonitorConfig {
                window: section.monitor_window,
                latency_threshold: Duration::from_millis(section.latency_threshold_ms),
                ..MonitorConfig::default()
            },
            queue: QueueConfig {
                capacity: section.queue_capacity,
                alert_watermark: section.queue_alert_watermark,
            },
            alert_capacity: section.alert_capacity,
        }
    }

    pub fn health_log_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.health_log_interval_ms)
    }
}
