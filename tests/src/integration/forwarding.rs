//! # Downstream Forwarding
//!
//! Validated samples leave the pipeline through the sample forwarder, which
//! sits behind its own circuit breaker. A failing collaborator must trip the
//! breaker without slowing ingestion, and an operator reset must restore
//! delivery.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use dl_07_reliability::{CircuitState, ReliabilityStatus, SAMPLE_FORWARDER_BREAKER};
    use dyno_runtime::{ForwardError, SampleForwarder};
    use shared_types::{AlertKind, ChannelId, ChannelKey, ProviderId, Sample};

    use crate::integration::fixtures::{wait_until, BenchBuilder};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Collaborator that fails until told otherwise.
    #[derive(Default)]
    struct FlakyForwarder {
        healthy: AtomicBool,
        attempts: AtomicUsize,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl SampleForwarder for FlakyForwarder {
        async fn forward(&self, batch: &[Sample]) -> Result<(), ForwardError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(ForwardError::Failed("collector unreachable".into()));
            }
            self.delivered.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    fn forwarder_state(bench: &crate::integration::fixtures::Bench) -> CircuitState {
        bench
            .runtime
            .container()
            .reliability
            .breakers()
            .get_state(SAMPLE_FORWARDER_BREAKER)
    }

    // =============================================================================
    // TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_failing_forwarder_trips_breaker_without_stalling_ingestion() {
        let forwarder = Arc::new(FlakyForwarder::default());
        let bench = BenchBuilder::new()
            .forwarder(forwarder.clone())
            .config(|c| c.reliability.open_timeout_ms = 60_000)
            .build();
        let dyno = bench.dyno(2, 0x0A, "dyno-a");
        bench.register(&dyno).await;

        for i in 0..12u32 {
            dyno.send_values(&[(1, i * 20, 3_000.0 + i as f32)]).await.unwrap();
        }

        let rpm = ChannelKey::new(ProviderId(0x0A), ChannelId(1));
        let validator = &bench.runtime.container().validator;
        wait_until("all frames validated", || {
            validator.metrics_snapshot(rpm).map(|m| m.total_count) == Some(12)
        })
        .await;

        // five failures open the breaker; later batches never reach it
        assert_eq!(forwarder.attempts.load(Ordering::SeqCst), 5);
        assert_eq!(forwarder_state(&bench), CircuitState::Open);

        let health = bench.runtime.reliability_health();
        assert!(health.status > ReliabilityStatus::Healthy);
        let breaker = health
            .breakers
            .iter()
            .find(|b| b.name == SAMPLE_FORWARDER_BREAKER)
            .unwrap();
        assert_eq!(breaker.rejected, 7);
        assert!(health
            .recent_alerts
            .iter()
            .any(|a| a.kind == AlertKind::CircuitOpened && a.source == SAMPLE_FORWARDER_BREAKER));

        forwarder.healthy.store(true, Ordering::SeqCst);
        assert!(bench.runtime.reset_circuit_breaker(SAMPLE_FORWARDER_BREAKER));
        assert_eq!(forwarder_state(&bench), CircuitState::Closed);

        dyno.send_values(&[(1, 400, 3_100.0), (2, 400, 13.8)]).await.unwrap();
        wait_until("batch delivered", || {
            forwarder.delivered.load(Ordering::SeqCst) == 2
        })
        .await;
        bench.runtime.shutdown().await;
    }
}
