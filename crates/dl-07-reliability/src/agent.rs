//! Facade tying breakers, monitors, the queue and alerts together.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_bus::EventPublisher;
use shared_types::{Alert, AlertKind, AlertSeverity, TimeSource};

use crate::alerts::AlertBuffer;
use crate::circuit_breaker::{CircuitBreakerRegistry, CircuitState, CircuitStats};
use crate::config::ReliabilityConfig;
use crate::errors::ReliabilityError;
use crate::health_monitor::{DependencyHealth, DependencyStats, HealthMonitorRegistry};
use crate::queue::{QueueStats, QueueStatsSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReliabilityStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Point-in-time view of the reliability layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityHealth {
    pub status: ReliabilityStatus,
    pub breakers: Vec<CircuitStats>,
    pub dependencies: Vec<DependencyStats>,
    pub queue: Option<QueueStats>,
    pub recent_alerts: Vec<Alert>,
}

/// Reopens a half-open breaker when a trial call is dropped before it
/// completes.
struct TrialGuard<'a> {
    breakers: &'a CircuitBreakerRegistry,
    name: &'a str,
    settled: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breakers.abandon_trial(self.name);
        }
    }
}

pub struct ReliabilityAgent {
    breakers: CircuitBreakerRegistry,
    monitors: HealthMonitorRegistry,
    alerts: Arc<AlertBuffer>,
    queue: RwLock<Option<Arc<dyn QueueStatsSource>>>,
    queue_alert_watermark: f64,
}

impl ReliabilityAgent {
    pub fn new(
        config: ReliabilityConfig,
        time_source: Arc<dyn TimeSource>,
        publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Self {
        Self {
            breakers: CircuitBreakerRegistry::new(config.breaker, time_source),
            monitors: HealthMonitorRegistry::new(config.monitor),
            alerts: Arc::new(AlertBuffer::new(config.alert_capacity, publisher)),
            queue: RwLock::new(None),
            queue_alert_watermark: config.queue.alert_watermark,
        }
    }

    /// Register a dependency so it shows up in health before its first call.
    pub fn register_dependency(&self, name: &str) {
        self.breakers.register(name);
        self.monitors.register(name);
    }

    /// Attach the ingestion queue whose stats are reported in [`Self::health`].
    pub fn attach_queue(&self, queue: Arc<dyn QueueStatsSource>) {
        *self.queue.write() = Some(queue);
    }

    /// Alert buffer shared with the ingestion queue.
    pub fn alerts(&self) -> Arc<AlertBuffer> {
        Arc::clone(&self.alerts)
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn monitors(&self) -> &HealthMonitorRegistry {
        &self.monitors
    }

    /// Run `op` through breaker `name`.
    ///
    /// When the breaker is open the future is dropped unpolled and
    /// [`ReliabilityError::CircuitOpen`] is returned. If the returned future
    /// is dropped mid-call, a half-open trial reopens the breaker.
    pub async fn call<T, E, F>(&self, name: &str, op: F) -> Result<T, ReliabilityError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if !self.breakers.should_allow(name) {
            return Err(ReliabilityError::CircuitOpen {
                name: name.to_string(),
            });
        }

        let mut trial = TrialGuard {
            breakers: &self.breakers,
            name,
            settled: false,
        };
        let started = Instant::now();
        let result = op.await;
        let latency = started.elapsed();
        trial.settled = true;

        match result {
            Ok(value) => {
                self.breakers.record_success(name);
                self.observe(name, true, latency);
                Ok(value)
            }
            Err(err) => {
                if self.breakers.record_failure(name) {
                    self.alerts.raise(
                        AlertKind::CircuitOpened,
                        AlertSeverity::Critical,
                        name,
                        format!("circuit '{name}' opened: {err}"),
                    );
                }
                self.observe(name, false, latency);
                Err(ReliabilityError::Inner(err))
            }
        }
    }

    fn observe(&self, name: &str, success: bool, latency: std::time::Duration) {
        if let Some(transition) = self.monitors.record(name, success, latency) {
            if transition.to == DependencyHealth::Unhealthy {
                self.alerts.raise(
                    AlertKind::DependencyUnhealthy,
                    AlertSeverity::Warning,
                    name,
                    format!("dependency '{name}' went {} -> unhealthy", transition.from),
                );
            }
        }
    }

    pub fn reset_circuit_breaker(&self, name: &str) -> bool {
        self.breakers.reset(name)
    }

    pub fn health(&self) -> ReliabilityHealth {
        let breakers = self.breakers.all_stats();
        let dependencies = self.monitors.all_stats();
        let queue = self.queue.read().as_ref().map(|q| q.queue_stats());

        let unhealthy = breakers.iter().any(|b| b.state == CircuitState::Open)
            || dependencies
                .iter()
                .any(|d| d.health == DependencyHealth::Unhealthy);
        let degraded = breakers.iter().any(|b| b.state == CircuitState::HalfOpen)
            || dependencies
                .iter()
                .any(|d| d.health == DependencyHealth::Degraded)
            || queue.as_ref().is_some_and(|q| {
                q.current_size as f64 >= q.capacity as f64 * self.queue_alert_watermark
            });

        let status = if unhealthy {
            ReliabilityStatus::Unhealthy
        } else if degraded {
            ReliabilityStatus::Degraded
        } else {
            ReliabilityStatus::Healthy
        };

        ReliabilityHealth {
            status,
            breakers,
            dependencies,
            queue,
            recent_alerts: self.alerts.recent(),
        }
    }
}
