//! Per-dependency health from the outcome and latency of recent calls.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependencyHealth {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for DependencyHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Calls kept per dependency.
    pub window: usize,
    /// Below this success rate the dependency is unhealthy.
    pub unhealthy_below: f64,
    /// Below this success rate the dependency is degraded.
    pub degraded_below: f64,
    /// Average latency above this is degraded.
    pub latency_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window: 100,
            unhealthy_below: 0.5,
            degraded_below: 0.9,
            latency_threshold: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Default)]
struct CallWindow {
    calls: VecDeque<(bool, Duration)>,
    status: Option<DependencyHealth>,
}

impl CallWindow {
    fn success_rate(&self) -> f64 {
        if self.calls.is_empty() {
            return 0.0;
        }
        let ok = self.calls.iter().filter(|(success, _)| *success).count();
        ok as f64 / self.calls.len() as f64
    }

    fn avg_latency(&self) -> Duration {
        if self.calls.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.calls.iter().map(|(_, latency)| *latency).sum();
        total / self.calls.len() as u32
    }
}

/// A health change produced by [`HealthMonitorRegistry::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: DependencyHealth,
    pub to: DependencyHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyStats {
    pub name: String,
    pub health: DependencyHealth,
    pub calls: usize,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
}

pub struct HealthMonitorRegistry {
    config: MonitorConfig,
    dependencies: RwLock<HashMap<String, CallWindow>>,
}

impl HealthMonitorRegistry {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            dependencies: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: &str) {
        self.dependencies
            .write()
            .entry(name.to_string())
            .or_default();
    }

    /// Record one call. Returns the transition if the classification changed.
    pub fn record(&self, name: &str, success: bool, latency: Duration) -> Option<HealthTransition> {
        let mut dependencies = self.dependencies.write();
        let window = dependencies.entry(name.to_string()).or_default();

        if window.calls.len() >= self.config.window.max(1) {
            window.calls.pop_front();
        }
        window.calls.push_back((success, latency));

        let from = window.status.unwrap_or(DependencyHealth::Unknown);
        let to = self.classify(window);
        window.status = Some(to);

        if from == to {
            return None;
        }
        match to {
            DependencyHealth::Unhealthy | DependencyHealth::Degraded => warn!(
                dependency = name,
                %from,
                %to,
                success_rate = window.success_rate(),
                "Dependency health changed"
            ),
            _ => info!(dependency = name, %from, %to, "Dependency health changed"),
        }
        Some(HealthTransition { from, to })
    }

    pub fn health(&self, name: &str) -> DependencyHealth {
        self.dependencies
            .read()
            .get(name)
            .map(|window| self.classify(window))
            .unwrap_or(DependencyHealth::Unknown)
    }

    /// Snapshot of every dependency, sorted by name.
    pub fn all_stats(&self) -> Vec<DependencyStats> {
        let dependencies = self.dependencies.read();
        let mut stats: Vec<_> = dependencies
            .iter()
            .map(|(name, window)| DependencyStats {
                name: name.clone(),
                health: self.classify(window),
                calls: window.calls.len(),
                success_rate: window.success_rate(),
                avg_latency_ms: window.avg_latency().as_millis() as u64,
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    fn classify(&self, window: &CallWindow) -> DependencyHealth {
        if window.calls.is_empty() {
            return DependencyHealth::Unknown;
        }
        let success_rate = window.success_rate();
        if success_rate < self.config.unhealthy_below {
            DependencyHealth::Unhealthy
        } else if success_rate < self.config.degraded_below
            || window.avg_latency() > self.config.latency_threshold
        {
            DependencyHealth::Degraded
        } else {
            DependencyHealth::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitorRegistry {
        HealthMonitorRegistry::new(MonitorConfig {
            window: 10,
            ..MonitorConfig::default()
        })
    }

    const FAST: Duration = Duration::from_millis(5);

    #[test]
    fn test_unknown_without_calls() {
        let monitor = monitor();
        assert_eq!(monitor.health("transport"), DependencyHealth::Unknown);
        monitor.register("transport");
        assert_eq!(monitor.health("transport"), DependencyHealth::Unknown);
    }

    #[test]
    fn test_healthy_then_degraded_then_unhealthy() {
        let monitor = monitor();
        let first = monitor.record("fwd", true, FAST).unwrap();
        assert_eq!(first.to, DependencyHealth::Healthy);

        for _ in 0..8 {
            monitor.record("fwd", true, FAST);
        }
        // 9/10 = 0.9, still healthy
        assert!(monitor.record("fwd", false, FAST).is_none());
        assert_eq!(monitor.health("fwd"), DependencyHealth::Healthy);

        // 8/10 successes after the oldest success rolls out
        let t = monitor.record("fwd", false, FAST).unwrap();
        assert_eq!(t.to, DependencyHealth::Degraded);

        for _ in 0..4 {
            monitor.record("fwd", false, FAST);
        }
        assert_eq!(monitor.health("fwd"), DependencyHealth::Unhealthy);
    }

    #[test]
    fn test_slow_calls_degrade() {
        let monitor = monitor();
        monitor.record("fwd", true, Duration::from_secs(2));
        assert_eq!(monitor.health("fwd"), DependencyHealth::Degraded);
    }

    #[test]
    fn test_stats_snapshot() {
        let monitor = monitor();
        monitor.record("b", true, Duration::from_millis(10));
        monitor.record("a", false, Duration::from_millis(30));

        let stats = monitor.all_stats();
        assert_eq!(stats[0].name, "a");
        assert_eq!(stats[0].health, DependencyHealth::Unhealthy);
        assert_eq!(stats[0].avg_latency_ms, 30);
        assert_eq!(stats[1].success_rate, 1.0);
    }
}
