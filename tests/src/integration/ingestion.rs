//! # Ingestion Flows
//!
//! Receive loop → ingestion queue → decode workers, under load and over
//! time:
//!
//! - a full queue sheds samples before registry changes and counts every
//!   drop in the frame statistics
//! - channels go stale once their last sample ages past the threshold
//! - provider counters map onto local time once a basis is established,
//!   and fall back to receive time after the provider clears
//! - with several workers, each provider's samples still post in arrival
//!   order

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use dl_05_channel_validator::HealthStatus;
    use dyno_runtime::wiring::{lane_for, run_receive_loop, run_worker, FramePipeline};
    use shared_bus::{EventFilter, EventTopic, TelemetryEvent};
    use shared_types::{
        AlertKind, ChannelId, ChannelKey, ManualTimeSource, ProviderId, Timestamp,
    };
    use tokio::sync::watch;

    use crate::integration::fixtures::{addr, wait_until, BenchBuilder};

    const DYNO: ProviderId = ProviderId(0x0A);

    fn rpm() -> ChannelKey {
        ChannelKey::new(DYNO, ChannelId(1))
    }

    // =============================================================================
    // BACKPRESSURE
    // =============================================================================

    #[tokio::test]
    async fn test_full_queue_sheds_samples_before_registry_changes() {
        let bench = BenchBuilder::new()
            .config(|c| c.reliability.queue_capacity = 4)
            .stopped()
            .build();
        let container = Arc::clone(bench.runtime.container());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receiver = tokio::spawn(run_receive_loop(
            bench.endpoint.clone(),
            Arc::clone(&container),
            shutdown_rx.clone(),
        ));

        let dyno = bench.dyno(2, DYNO.value(), "dyno-a");
        dyno.announce().await.unwrap();
        for i in 0..10 {
            dyno.send_values(&[(1, i * 20, 3_000.0)]).await.unwrap();
        }
        wait_until("seven samples shed", || {
            container.validator.frames().snapshot().dropped == 7
        })
        .await;

        let stats = container.queue.stats();
        assert_eq!(stats.current_size, 4);
        assert_eq!(stats.dropped_by_priority.normal, 7);
        assert_eq!(stats.enqueued_by_priority.high, 1);

        // a clear outranks queued samples and evicts the newest one
        dyno.clear().await.unwrap();
        wait_until("sample evicted", || {
            container.validator.frames().snapshot().dropped == 8
        })
        .await;
        assert_eq!(container.queue.len(), 4);

        let alerts = bench.runtime.reliability_health().recent_alerts;
        let watermark = alerts
            .iter()
            .filter(|a| a.kind == AlertKind::QueueHighWatermark)
            .count();
        assert_eq!(watermark, 1);

        let pipeline = Arc::new(FramePipeline::new(Arc::clone(&container)));
        let worker = tokio::spawn(run_worker(0, pipeline, shutdown_rx));
        wait_until("queue drained", || container.queue.stats().processed == 4).await;

        // announcement then clear, then the two surviving samples
        assert!(bench.runtime.providers().is_empty());
        assert_eq!(container.validator.frames().snapshot().unknown_channel, 2);
        assert!(container.queue.is_empty());

        shutdown_tx.send(true).unwrap();
        receiver.await.unwrap();
        worker.await.unwrap();
    }

    // =============================================================================
    // ORDERING
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_samples_post_in_arrival_order_across_workers() {
        let bench = BenchBuilder::new()
            .config(|c| c.runtime.workers = 4)
            .build();
        let mut samples = bench
            .runtime
            .subscribe(EventFilter::topics(vec![EventTopic::Samples]));
        let a = bench.dyno(2, 0x0A, "dyno-a");
        let b = bench.dyno(3, 0x0B, "dyno-b");
        bench.register(&a).await;
        bench.register(&b).await;

        for i in 0..50u32 {
            a.send_values(&[(1, i * 20, i as f32)]).await.unwrap();
            b.send_values(&[(1, i * 20, i as f32)]).await.unwrap();
        }

        let mut last: HashMap<ProviderId, f32> = HashMap::new();
        for _ in 0..100 {
            let event = tokio::time::timeout(Duration::from_secs(2), samples.recv())
                .await
                .unwrap();
            let Some(TelemetryEvent::SamplePosted(sample)) = event else {
                panic!("unexpected event {event:?}");
            };
            let provider = sample.key.provider;
            if let Some(previous) = last.insert(provider, sample.value) {
                assert!(sample.value > previous, "{provider}: {} after {previous}", sample.value);
            }
        }

        let validator = &bench.runtime.container().validator;
        for id in [0x0A, 0x0B] {
            let key = ChannelKey::new(ProviderId(id), ChannelId(1));
            let metrics = validator.metrics_snapshot(key).unwrap();
            assert_eq!(metrics.last_value, Some(49.0));
            assert_eq!(metrics.total_count, 50);
        }
        bench.runtime.shutdown().await;
    }

    #[test]
    fn test_source_always_maps_to_one_lane() {
        for last in 2..40u8 {
            let lane = lane_for(addr(last), 4);
            assert!(lane < 4);
            assert_eq!(lane_for(addr(last), 4), lane);
            assert_eq!(lane_for(addr(last), 1), 0);
        }
    }

    // =============================================================================
    // STALENESS
    // =============================================================================

    #[tokio::test]
    async fn test_channels_go_stale_after_two_seconds_of_silence() {
        let clock = Arc::new(ManualTimeSource::new(1_000_000));
        let bench = BenchBuilder::new()
            .time_source(clock.clone())
            .config(|c| c.discovery.provider_timeout_ms = 60_000)
            .build();
        let dyno = bench.dyno(2, DYNO.value(), "dyno-a");
        bench.register(&dyno).await;

        let validator = &bench.runtime.container().validator;
        for i in 0..20u32 {
            dyno.send_values(&[(1, i * 50, 3_000.0 + i as f32 * 25.0), (2, i * 50, 13.5)])
                .await
                .unwrap();
            let expected = u64::from(i) + 1;
            wait_until("frame recorded", || {
                validator.metrics_snapshot(rpm()).map(|m| m.total_count) == Some(expected)
            })
            .await;
            clock.advance(Duration::from_millis(50));
        }

        let fresh = bench.runtime.channel_health();
        assert_eq!(fresh.status, HealthStatus::Healthy, "{fresh:?}");
        assert!(fresh.channels.iter().all(|c| c.age_ms == Some(50)));

        clock.advance(Duration::from_millis(1_950));
        let aged = bench.runtime.channel_health();
        assert!(aged.channels.iter().all(|c| c.status == HealthStatus::Stale));
        assert_eq!(aged.status, HealthStatus::Stale);
        assert_eq!(aged.channels[0].age_ms, Some(2_000));
        bench.runtime.shutdown().await;
    }

    // =============================================================================
    // CLOCK RECONCILIATION
    // =============================================================================

    #[tokio::test]
    async fn test_counters_map_onto_established_basis() {
        let bench = BenchBuilder::new().build();
        let mut samples = bench
            .runtime
            .subscribe(EventFilter::topics(vec![EventTopic::Samples]));
        let dyno = bench.dyno(2, DYNO.value(), "dyno-a");
        bench.register(&dyno).await;

        let container = bench.runtime.container();
        container.sync_table.establish(DYNO, Timestamp(5_000_000), 500);
        dyno.send_values(&[(1, 600, 3_200.0)]).await.unwrap();

        let Some(TelemetryEvent::SamplePosted(synced)) = samples.recv().await else {
            panic!("expected a sample");
        };
        assert_eq!(synced.timestamp, Timestamp(5_000_100));
        assert!(!synced.locally_timestamped);

        dyno.clear().await.unwrap();
        wait_until("provider cleared", || bench.runtime.providers().is_empty()).await;
        bench.register(&dyno).await;
        dyno.send_values(&[(1, 700, 3_300.0)]).await.unwrap();

        let Some(TelemetryEvent::SamplePosted(unsynced)) = samples.recv().await else {
            panic!("expected a sample");
        };
        assert!(unsynced.locally_timestamped);
        assert_eq!(unsynced.timestamp, unsynced.received_at);
        assert_eq!(container.reconciler.stats().synced, 1);
        bench.runtime.shutdown().await;
    }
}
