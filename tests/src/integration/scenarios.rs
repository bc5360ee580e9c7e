//! # Operator Scenarios
//!
//! The situations a dyno operator actually runs into:
//!
//! 1. Two providers share channel ids; only the pinned one reaches capture
//! 2. A provider without an AFR channel is refused in blocking mode
//! 3. A flat RPM trace is flagged as frozen without blocking capture
//! 4. AFR outside its plausible band is reported with the observed extremes
//! 5. A tripped breaker recovers after one successful half-open trial

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use dl_06_preflight::{PreflightMode, Stage};
    use dl_07_reliability::{
        CircuitState, ReliabilityAgent, ReliabilityConfig, ReliabilityError,
    };
    use dyno_runtime::RuntimeError;
    use shared_bus::{EventFilter, EventTopic, TelemetryEvent};
    use shared_types::{AlertKind, ManualTimeSource, ProviderId, Unit};

    use crate::integration::fixtures::{never_cancelled, stream, sweep, wait_until, BenchBuilder};

    // =============================================================================
    // SCENARIO 1: ISOLATION
    // =============================================================================

    #[tokio::test]
    async fn test_colliding_provider_never_reaches_capture() {
        let bench = BenchBuilder::new()
            .config(|c| c.discovery.provider_timeout_ms = 10_000)
            .build();
        let a = bench.dyno(2, 0x0A, "dyno-a");
        let b = bench.dyno(3, 0x0B, "dyno-b");
        bench.register(&a).await;
        bench.register(&b).await;

        let warmup = stream(Arc::clone(&a), 40, sweep);
        let preflight = bench
            .runtime
            .run_preflight(
                Some(ProviderId(0x0A)),
                PreflightMode::Blocking,
                None,
                never_cancelled(),
            )
            .await;
        warmup.await.unwrap();
        assert!(preflight.passed, "{:?}", preflight.failed_checks().collect::<Vec<_>>());

        let mut samples = bench
            .runtime
            .subscribe(EventFilter::topics(vec![EventTopic::Samples]));
        bench
            .runtime
            .start_session(ProviderId(0x0A), Some(&preflight))
            .unwrap();

        let pinned = stream(Arc::clone(&a), 20, sweep);
        let intruder = stream(Arc::clone(&b), 20, |_| (9_999.0, 14.7));
        pinned.await.unwrap();
        intruder.await.unwrap();

        // 20 frames of two values each from the pinned provider
        let mut seen = 0;
        while seen < 40 {
            let event = tokio::time::timeout(Duration::from_secs(2), samples.recv())
                .await
                .unwrap();
            let Some(TelemetryEvent::SamplePosted(sample)) = event else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(sample.key.provider, ProviderId(0x0A));
            assert_ne!(sample.value, 9_999.0);
            seen += 1;
        }
        wait_until("intruder frames discarded", || {
            bench.runtime.channel_health().frames.non_provider == 20
        })
        .await;

        let summary = bench.runtime.stop_session().unwrap();
        assert_eq!(summary.provider, ProviderId(0x0A));
        assert!(!summary.channels.is_empty());
        assert!(summary
            .channels
            .iter()
            .all(|c| c.key.provider == ProviderId(0x0A) && c.last_value != Some(9_999.0)));
        bench.runtime.shutdown().await;
    }

    // =============================================================================
    // SCENARIO 2: MISSING REQUIRED CHANNEL
    // =============================================================================

    #[tokio::test]
    async fn test_provider_without_afr_is_refused() {
        let bench = BenchBuilder::new().build();
        let rpm_only = bench.provider(
            2,
            0x0A,
            "rpm-map",
            &[(1, "RPM", Unit::EngineSpeed), (3, "MAP", Unit::Pressure)],
        );
        bench.register(&rpm_only).await;

        let result = bench
            .runtime
            .run_preflight(None, PreflightMode::Blocking, None, never_cancelled())
            .await;

        assert!(!result.passed);
        assert_eq!(result.provider_id, Some(ProviderId(0x0A)));
        assert_eq!(result.missing_channels, vec!["AFR".to_string()]);
        assert!(!result.can_override);
        // diagnostics keep running past the failed stage
        assert!(result.stages_run().contains(&Stage::HealthThresholds));

        assert!(matches!(
            bench.runtime.start_session(ProviderId(0x0A), Some(&result)),
            Err(RuntimeError::PreflightFailed { .. })
        ));
        assert!(bench.runtime.active_session().is_none());
        bench.runtime.shutdown().await;
    }

    // =============================================================================
    // SCENARIOS 3 & 4: SEMANTIC CHECKS
    // =============================================================================

    #[tokio::test]
    async fn test_flat_rpm_is_reported_frozen() {
        let bench = BenchBuilder::new().build();
        let dyno = bench.dyno(2, 0x0A, "dyno-a");
        bench.register(&dyno).await;

        let streaming = stream(Arc::clone(&dyno), 40, |i| (3_000.0, sweep(i).1));
        let result = bench
            .runtime
            .run_preflight(None, PreflightMode::Blocking, None, never_cancelled())
            .await;
        streaming.await.unwrap();

        let frozen = result.check("RPM frozen").unwrap();
        assert!(!frozen.passed);
        assert!(frozen.message.contains("3000"), "{}", frozen.message);
        assert!(result.check("AFR frozen").unwrap().passed);
        // semantic findings never gate capture
        assert!(result.passed);
        bench.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_implausible_afr_reports_observed_extremes() {
        let bench = BenchBuilder::new().build();
        let dyno = bench.dyno(2, 0x0A, "dyno-a");
        bench.register(&dyno).await;

        let afr = |i: u32| if i % 2 == 0 { 9.0 } else { 21.0 };
        let streaming = stream(Arc::clone(&dyno), 40, move |i| (sweep(i).0, afr(i)));
        let result = bench
            .runtime
            .run_preflight(None, PreflightMode::Blocking, None, never_cancelled())
            .await;
        streaming.await.unwrap();

        let range = result.check("AFR range").unwrap();
        assert!(!range.passed);
        assert_eq!(range.stage, Stage::Semantic);
        assert_eq!(range.observed_min, Some(9.0));
        assert_eq!(range.observed_max, Some(21.0));
        assert!(result.check("RPM frozen").unwrap().passed);
        assert!(result.passed);
        bench.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_replayed_stream_gives_same_verdict() {
        let mut results = Vec::new();
        for _ in 0..2 {
            let bench = BenchBuilder::new().build();
            let dyno = bench.dyno(2, 0x0A, "dyno-a");
            bench.register(&dyno).await;

            let streaming = stream(Arc::clone(&dyno), 40, sweep);
            let result = bench
                .runtime
                .run_preflight(
                    Some(ProviderId(0x0A)),
                    PreflightMode::Blocking,
                    None,
                    never_cancelled(),
                )
                .await;
            streaming.await.unwrap();
            bench.runtime.shutdown().await;
            results.push(result);
        }

        let (first, second) = (&results[0], &results[1]);
        assert!(first.passed);
        assert!(first.check("RPM rate").unwrap().measured.is_some());
        for (a, b) in first.checks.iter().zip(&second.checks) {
            assert!(a.same_outcome(b), "{a:?} vs {b:?}");
        }
        assert!(first.same_verdict(second));
    }

    // =============================================================================
    // SCENARIO 5: BREAKER RECOVERY
    // =============================================================================

    #[tokio::test]
    async fn test_breaker_closes_after_half_open_success() {
        let clock = Arc::new(ManualTimeSource::new(1_000));
        let agent = ReliabilityAgent::new(ReliabilityConfig::default(), clock.clone(), None);
        agent.register_dependency("downstream");

        for _ in 0..5 {
            let result = agent
                .call("downstream", async { Err::<(), _>("connection refused") })
                .await;
            assert!(matches!(result, Err(ReliabilityError::Inner(_))));
        }
        assert_eq!(agent.breakers().get_state("downstream"), CircuitState::Open);

        let polled = AtomicBool::new(false);
        let rejected = agent
            .call("downstream", async {
                polled.store(true, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;
        assert!(rejected.unwrap_err().is_circuit_open());
        assert!(!polled.load(Ordering::SeqCst));

        clock.advance(Duration::from_secs(30));
        agent
            .call("downstream", async { Ok::<_, &str>(()) })
            .await
            .unwrap();

        let stats = agent.breakers().get_stats("downstream").unwrap();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.rejected, 1);

        let opened: Vec<_> = agent
            .health()
            .recent_alerts
            .into_iter()
            .filter(|a| a.kind == AlertKind::CircuitOpened)
            .collect();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].source, "downstream");
    }
}
