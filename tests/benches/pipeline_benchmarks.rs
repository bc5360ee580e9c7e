//! # DynoLink Pipeline Benchmarks
//!
//! Hot-path costs per datagram. A dyno streams on the order of 50 frames a
//! second per provider; decode, queueing and validation together should
//! stay well under a millisecond per frame.
//!
//! | Stage | Operation |
//! |-------|-----------|
//! | Wire codec | decode a values frame, walk a batched datagram |
//! | Ingestion queue | push and pop under mixed priorities |
//! | Channel validator | record a sample, compute pipeline health |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dl_01_wire_codec::{decode_frame, encode_body, frames, MessageBody, ValueRecord};
use dl_05_channel_validator::{ChannelValidator, UnitRanges, ValidatorConfig};
use dl_07_reliability::{IngestionQueue, Priority, QueueConfig};
use rand::Rng;
use shared_types::{
    ChannelId, ChannelInfo, ChannelKey, ProviderId, Sample, SystemTimeSource, TimeSource,
    Timestamp, Unit,
};

fn values_frame(records: u16, sequence: u8) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let body = MessageBody::Values(
        (0..records)
            .map(|channel| ValueRecord {
                channel: ChannelId(channel),
                counter: u32::from(sequence) * 20,
                value: rng.gen_range(0.0..8_000.0),
            })
            .collect(),
    );
    encode_body(&body, ProviderId(0x0A), sequence, ProviderId::BROADCAST).unwrap()
}

// ============================================================================
// WIRE CODEC
// ============================================================================

fn bench_wire_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("dl-01-wire-codec");
    group.measurement_time(Duration::from_secs(5));

    for records in [1u16, 8, 32] {
        let frame = values_frame(records, 1);
        group.throughput(Throughput::Elements(u64::from(records)));
        group.bench_with_input(BenchmarkId::new("decode_values", records), &frame, |b, f| {
            b.iter(|| black_box(decode_frame(f).unwrap()))
        });
    }

    // several frames batched into one datagram
    let datagram: Vec<u8> = (0..8u8).flat_map(|seq| values_frame(8, seq)).collect();
    group.throughput(Throughput::Elements(8));
    group.bench_function("walk_batched_datagram", |b| {
        b.iter(|| black_box(frames(&datagram).filter(Result::is_ok).count()))
    });

    group.finish();
}

// ============================================================================
// INGESTION QUEUE
// ============================================================================

fn bench_ingestion_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("dl-07-ingestion-queue");

    group.bench_function("push_pop_mixed_priority", |b| {
        let queue = IngestionQueue::new(QueueConfig::default(), None);
        let priorities = [Priority::Normal, Priority::Normal, Priority::High, Priority::Low];
        b.iter(|| {
            for (i, priority) in priorities.iter().enumerate() {
                queue.push(black_box(i), *priority);
            }
            while let Some(item) = queue.try_pop() {
                black_box(item.item);
                queue.mark_processed();
            }
        })
    });

    group.bench_function("shed_when_full", |b| {
        let queue = IngestionQueue::new(
            QueueConfig {
                capacity: 64,
                alert_watermark: 1.0,
            },
            None,
        );
        for i in 0..64 {
            queue.push(i, Priority::Normal);
        }
        b.iter(|| black_box(queue.push(0, Priority::Normal)))
    });

    group.finish();
}

// ============================================================================
// CHANNEL VALIDATOR
// ============================================================================

fn bench_channel_validator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dl-05-channel-validator");
    let time_source: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let validator = ChannelValidator::new(
        ValidatorConfig::default(),
        UnitRanges::default(),
        Arc::clone(&time_source),
    );
    let info = ChannelInfo::new(ChannelId(1), "RPM", Unit::EngineSpeed);
    let key = ChannelKey::new(ProviderId(0x0A), ChannelId(1));

    group.bench_function("record_sample", |b| {
        let mut value = 800.0f32;
        b.iter(|| {
            value = if value > 7_000.0 { 800.0 } else { value + 13.0 };
            let now = time_source.now();
            let sample = Sample {
                key,
                timestamp: now,
                value,
                locally_timestamped: true,
                received_at: now,
            };
            black_box(validator.record(&sample, &info))
        })
    });

    for channel in 2..24u16 {
        let info = ChannelInfo::new(ChannelId(channel), format!("CH{channel}"), Unit::NoUnit);
        let sample = Sample {
            key: ChannelKey::new(ProviderId(0x0A), ChannelId(channel)),
            timestamp: Timestamp(0),
            value: 1.0,
            locally_timestamped: true,
            received_at: time_source.now(),
        };
        validator.record(&sample, &info);
    }
    group.bench_function("pipeline_health_24_channels", |b| {
        b.iter(|| black_box(validator.pipeline_health()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_wire_codec,
    bench_ingestion_queue,
    bench_channel_validator
);
criterion_main!(benches);
