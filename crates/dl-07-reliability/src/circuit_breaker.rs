//! Named circuit breakers for external dependencies.
//!
//! # Circuit Breaker States
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    CIRCUIT BREAKER STATE MACHINE                    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │                    trial success                                    │
//! │            ┌─────────────────────┐                                  │
//! │            │                     │                                  │
//! │            ▼                     │                                  │
//! │      ┌──────────┐          ┌──────────┐          ┌──────────┐       │
//! │      │  CLOSED  │ ───────► │   OPEN   │ ───────► │HALF-OPEN │       │
//! │      │ (normal) │ failures │ (reject) │  backoff │ (1 trial)│       │
//! │      └──────────┘          └──────────┘          └──────────┘       │
//! │                                  ▲                     │            │
//! │                                  └─────────────────────┘            │
//! │                                      trial failure                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Configuration
//!
//! - `failure_threshold`: consecutive failures before opening (default: 5)
//! - `failure_ratio` / `min_calls` / `window_size`: ratio trip over the last
//!   `window_size` calls once at least `min_calls` were made
//! - `open_timeout`: backoff before the half-open trial (default: 30s)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{TimeSource, Timestamp};
use tracing::{debug, info, warn};

/// Breaker guarding sends to the multicast transport.
pub const TRANSPORT_BREAKER: &str = "transport";

/// Breaker guarding the optional downstream sample forwarder.
pub const SAMPLE_FORWARDER_BREAKER: &str = "sample-forwarder";

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Calls are rejected immediately
    Open,
    /// Backoff elapsed - exactly one trial call is admitted
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Failure ratio over the rolling window that opens the circuit.
    /// `None` disables ratio tripping.
    pub failure_ratio: Option<f64>,
    /// Calls required in the window before the ratio is considered
    pub min_calls: usize,
    /// Number of recent calls kept for the ratio and success rate
    pub window_size: usize,
    /// Duration before half-open from open state
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_ratio: Some(0.5),
            min_calls: 10,
            window_size: 20,
            open_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn for_testing() -> Self {
        Self {
            failure_threshold: 5,
            failure_ratio: None,
            min_calls: 4,
            window_size: 8,
            open_timeout: Duration::from_millis(100),
        }
    }
}

struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    /// Recent outcomes, `true` for success.
    window: VecDeque<bool>,
    opened_at: Option<Timestamp>,
    trial_in_flight: bool,
    last_failure_at: Option<Timestamp>,
    last_transition: Timestamp,
    total_calls: u64,
    total_failures: u64,
    rejected: u64,
}

impl Circuit {
    fn new(now: Timestamp) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            window: VecDeque::new(),
            opened_at: None,
            trial_in_flight: false,
            last_failure_at: None,
            last_transition: now,
            total_calls: 0,
            total_failures: 0,
            rejected: 0,
        }
    }

    fn push_outcome(&mut self, success: bool, window_size: usize) {
        if self.window.len() >= window_size.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(success);
    }

    fn success_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 1.0;
        }
        let successes = self.window.iter().filter(|ok| **ok).count();
        successes as f64 / self.window.len() as f64
    }

    fn transition(&mut self, to: CircuitState, now: Timestamp) {
        self.state = to;
        self.last_transition = now;
        match to {
            CircuitState::Open => {
                self.opened_at = Some(now);
                self.trial_in_flight = false;
            }
            CircuitState::HalfOpen => {
                self.trial_in_flight = true;
            }
            CircuitState::Closed => {
                self.opened_at = None;
                self.trial_in_flight = false;
                self.consecutive_failures = 0;
                self.window.clear();
            }
        }
    }
}

/// Process-wide set of named circuit breakers.
pub struct CircuitBreakerRegistry {
    circuits: RwLock<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
    time_source: Arc<dyn TimeSource>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            circuits: RwLock::new(HashMap::new()),
            config,
            time_source,
        }
    }

    /// Make a breaker visible in stats before its first call.
    pub fn register(&self, name: &str) {
        let now = self.time_source.now();
        self.circuits
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Circuit::new(now));
    }

    /// Check if a call through `name` should be made.
    ///
    /// An open breaker whose backoff has elapsed moves to half-open and
    /// admits exactly one trial; further calls are rejected until the trial
    /// is recorded.
    pub fn should_allow(&self, name: &str) -> bool {
        let now = self.time_source.now();
        let mut circuits = self.circuits.write();
        let circuit = circuits
            .entry(name.to_string())
            .or_insert_with(|| Circuit::new(now));

        let allowed = match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = circuit.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.config.open_timeout {
                    info!(breaker = name, "Circuit breaker transitioning to half-open");
                    circuit.transition(CircuitState::HalfOpen, now);
                    true
                } else {
                    debug!(
                        breaker = name,
                        remaining_ms = (self.config.open_timeout - elapsed).as_millis() as u64,
                        "Circuit breaker is open, rejecting call"
                    );
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    false
                } else {
                    circuit.trial_in_flight = true;
                    true
                }
            }
        };

        if allowed {
            circuit.total_calls += 1;
        } else {
            circuit.rejected += 1;
        }
        allowed
    }

    /// Record a successful call.
    pub fn record_success(&self, name: &str) {
        let now = self.time_source.now();
        let mut circuits = self.circuits.write();
        let Some(circuit) = circuits.get_mut(name) else {
            return;
        };

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
                circuit.push_outcome(true, self.config.window_size);
            }
            CircuitState::HalfOpen => {
                info!(breaker = name, "Circuit breaker closing after successful trial");
                circuit.transition(CircuitState::Closed, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Reopen a half-open breaker whose trial ended without an outcome.
    ///
    /// Not counted as a failure. Returns `true` when the breaker reopened.
    pub fn abandon_trial(&self, name: &str) -> bool {
        let now = self.time_source.now();
        let mut circuits = self.circuits.write();
        match circuits.get_mut(name) {
            Some(circuit) if circuit.state == CircuitState::HalfOpen && circuit.trial_in_flight => {
                warn!(breaker = name, "Half-open trial abandoned, reopening");
                circuit.transition(CircuitState::Open, now);
                true
            }
            _ => false,
        }
    }

    /// Record a failed call.
    ///
    /// Returns `true` when this failure opened the circuit.
    pub fn record_failure(&self, name: &str) -> bool {
        let now = self.time_source.now();
        let mut circuits = self.circuits.write();
        let circuit = circuits
            .entry(name.to_string())
            .or_insert_with(|| Circuit::new(now));

        circuit.total_failures += 1;
        circuit.last_failure_at = Some(now);

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                circuit.push_outcome(false, self.config.window_size);

                let consecutive_trip = circuit.consecutive_failures >= self.config.failure_threshold;
                let ratio_trip = self.config.failure_ratio.is_some_and(|ratio| {
                    circuit.window.len() >= self.config.min_calls
                        && 1.0 - circuit.success_rate() >= ratio
                });

                if consecutive_trip || ratio_trip {
                    warn!(
                        breaker = name,
                        failures = circuit.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        success_rate = circuit.success_rate(),
                        timeout_ms = self.config.open_timeout.as_millis() as u64,
                        "Circuit breaker opening due to failures"
                    );
                    circuit.transition(CircuitState::Open, now);
                    return true;
                }
                false
            }
            CircuitState::HalfOpen => {
                warn!(breaker = name, "Circuit breaker reopening after trial failure");
                circuit.consecutive_failures += 1;
                circuit.transition(CircuitState::Open, now);
                true
            }
            CircuitState::Open => false,
        }
    }

    /// Current state; unknown breakers are closed.
    pub fn get_state(&self, name: &str) -> CircuitState {
        self.circuits
            .read()
            .get(name)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn get_stats(&self, name: &str) -> Option<CircuitStats> {
        let now = self.time_source.now();
        self.circuits
            .read()
            .get(name)
            .map(|circuit| stats_for(name, circuit, now))
    }

    /// Statistics for all breakers, sorted by name.
    pub fn all_stats(&self) -> Vec<CircuitStats> {
        let now = self.time_source.now();
        let mut stats: Vec<_> = self
            .circuits
            .read()
            .iter()
            .map(|(name, circuit)| stats_for(name, circuit, now))
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Force a breaker closed. Returns `false` for unknown names.
    pub fn reset(&self, name: &str) -> bool {
        let now = self.time_source.now();
        let mut circuits = self.circuits.write();
        match circuits.get_mut(name) {
            Some(circuit) => {
                info!(breaker = name, "Circuit breaker manually reset");
                circuit.transition(CircuitState::Closed, now);
                true
            }
            None => false,
        }
    }
}

fn stats_for(name: &str, circuit: &Circuit, now: Timestamp) -> CircuitStats {
    CircuitStats {
        name: name.to_string(),
        state: circuit.state,
        consecutive_failures: circuit.consecutive_failures,
        success_rate: circuit.success_rate(),
        total_calls: circuit.total_calls,
        total_failures: circuit.total_failures,
        rejected: circuit.rejected,
        last_failure_at: circuit.last_failure_at,
        time_in_state_ms: now
            .saturating_duration_since(circuit.last_transition)
            .as_millis() as u64,
    }
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Success rate over the rolling window (1.0 when empty).
    pub success_rate: f64,
    pub total_calls: u64,
    pub total_failures: u64,
    /// Calls short-circuited while open or while a trial was in flight.
    pub rejected: u64,
    pub last_failure_at: Option<Timestamp>,
    pub time_in_state_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ManualTimeSource;

    fn registry(config: CircuitBreakerConfig) -> (CircuitBreakerRegistry, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(1_000));
        (CircuitBreakerRegistry::new(config, clock.clone()), clock)
    }

    fn fail(registry: &CircuitBreakerRegistry, name: &str, times: usize) {
        for _ in 0..times {
            assert!(registry.should_allow(name));
            registry.record_failure(name);
        }
    }

    #[test]
    fn test_circuit_starts_closed() {
        let (registry, _) = registry(CircuitBreakerConfig::for_testing());
        assert_eq!(registry.get_state("transport"), CircuitState::Closed);
        assert!(registry.should_allow("transport"));
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let (registry, _) = registry(CircuitBreakerConfig::for_testing());

        for i in 0..5 {
            assert!(registry.should_allow("transport"));
            let opened = registry.record_failure("transport");
            assert_eq!(opened, i == 4);
        }

        assert_eq!(registry.get_state("transport"), CircuitState::Open);
        assert!(!registry.should_allow("transport"));
        assert_eq!(registry.get_stats("transport").unwrap().rejected, 1);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let (registry, _) = registry(CircuitBreakerConfig::for_testing());

        fail(&registry, "transport", 4);
        registry.should_allow("transport");
        registry.record_success("transport");
        fail(&registry, "transport", 4);

        assert_eq!(registry.get_state("transport"), CircuitState::Closed);
    }

    #[test]
    fn test_ratio_trip() {
        let config = CircuitBreakerConfig {
            failure_threshold: 100,
            failure_ratio: Some(0.5),
            min_calls: 4,
            window_size: 4,
            open_timeout: Duration::from_secs(1),
        };
        let (registry, _) = registry(config);

        // success, failure, success, failure -> 50% over 4 calls
        for success in [true, false, true] {
            registry.should_allow("fwd");
            if success {
                registry.record_success("fwd");
            } else {
                registry.record_failure("fwd");
            }
        }
        assert_eq!(registry.get_state("fwd"), CircuitState::Closed);

        registry.should_allow("fwd");
        assert!(registry.record_failure("fwd"));
        assert_eq!(registry.get_state("fwd"), CircuitState::Open);
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let (registry, clock) = registry(CircuitBreakerConfig::for_testing());
        fail(&registry, "transport", 5);

        clock.advance(Duration::from_millis(99));
        assert!(!registry.should_allow("transport"));

        clock.advance(Duration::from_millis(1));
        assert!(registry.should_allow("transport"));
        assert_eq!(registry.get_state("transport"), CircuitState::HalfOpen);
        assert!(!registry.should_allow("transport"));
    }

    #[test]
    fn test_half_open_success_closes_and_resets() {
        let (registry, clock) = registry(CircuitBreakerConfig::for_testing());
        fail(&registry, "transport", 5);

        clock.advance(Duration::from_millis(100));
        assert!(registry.should_allow("transport"));
        registry.record_success("transport");

        assert_eq!(registry.get_state("transport"), CircuitState::Closed);
        let stats = registry.get_stats("transport").unwrap();
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.total_failures, 5);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (registry, clock) = registry(CircuitBreakerConfig::for_testing());
        fail(&registry, "transport", 5);

        clock.advance(Duration::from_millis(100));
        assert!(registry.should_allow("transport"));
        assert!(registry.record_failure("transport"));
        assert_eq!(registry.get_state("transport"), CircuitState::Open);

        // Backoff restarts from the trial failure.
        clock.advance(Duration::from_millis(50));
        assert!(!registry.should_allow("transport"));
    }

    #[test]
    fn test_breakers_are_independent() {
        let (registry, _) = registry(CircuitBreakerConfig::for_testing());
        fail(&registry, "transport", 5);

        assert_eq!(registry.get_state("transport"), CircuitState::Open);
        assert_eq!(registry.get_state("sample-forwarder"), CircuitState::Closed);
        assert!(registry.should_allow("sample-forwarder"));
    }

    #[test]
    fn test_manual_reset() {
        let (registry, _) = registry(CircuitBreakerConfig::for_testing());
        fail(&registry, "transport", 5);

        assert!(registry.reset("transport"));
        assert_eq!(registry.get_state("transport"), CircuitState::Closed);
        assert!(registry.should_allow("transport"));
        assert!(!registry.reset("unknown"));
    }

    #[test]
    fn test_all_stats_sorted() {
        let (registry, _) = registry(CircuitBreakerConfig::for_testing());
        registry.register("transport");
        registry.register("sample-forwarder");

        let names: Vec<_> = registry.all_stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["sample-forwarder", "transport"]);
    }
}
