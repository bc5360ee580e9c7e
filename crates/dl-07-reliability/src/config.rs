use crate::circuit_breaker::CircuitBreakerConfig;
use crate::health_monitor::MonitorConfig;
use crate::queue::QueueConfig;

#[derive(Debug, Clone)]
pub struct ReliabilityConfig {
    pub breaker: CircuitBreakerConfig,
    pub monitor: MonitorConfig,
    pub queue: QueueConfig,
    /// Recent alerts retained for health queries.
    pub alert_capacity: usize,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::default(),
            monitor: MonitorConfig::default(),
            queue: QueueConfig::default(),
            alert_capacity: 100,
        }
    }
}

impl ReliabilityConfig {
    pub fn for_testing() -> Self {
        Self {
            breaker: CircuitBreakerConfig::for_testing(),
            monitor: MonitorConfig::default(),
            queue: QueueConfig::for_testing(),
            alert_capacity: 16,
        }
    }
}
