//! Decode workers.
//!
//! Each worker takes a datagram, walks its frames and routes them. No error
//! here is fatal: malformed frames are counted and skipped, unknown keys and
//! foreign senders are counted and discarded.
//!
//! With several workers, a dispatcher pops the queue and hands each datagram
//! to the lane owned by its source address, so one sender's datagrams are
//! always processed by the same worker in arrival order.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;

use dl_01_wire_codec::{frames, Frame, MessageBody, MessageHeader, ValueRecord};
use dl_03_provider_discovery::{cancelled, SequenceOutcome};
use dl_05_channel_validator::RecordOutcome;
use dl_07_reliability::{Dequeued, ReliabilityError, SAMPLE_FORWARDER_BREAKER};
use dyno_telemetry::log_channel_event;
use shared_bus::{EventPublisher, TelemetryEvent};
use shared_types::{ChannelKey, ProviderId, Sample, Timestamp};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::container::{InboundDatagram, SubsystemContainer};

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatagramReport {
    pub frames: usize,
    pub malformed: usize,
    pub samples: usize,
}

/// Routes decoded frames into the subsystems.
pub struct FramePipeline {
    container: Arc<SubsystemContainer>,
}

impl FramePipeline {
    pub fn new(container: Arc<SubsystemContainer>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<SubsystemContainer> {
        &self.container
    }

    pub async fn process(&self, datagram: &InboundDatagram) -> DatagramReport {
        let stats = self.container.validator.frames();
        let mut report = DatagramReport::default();

        for decoded in frames(&datagram.bytes) {
            match decoded {
                Ok(frame) => {
                    stats.record_frame();
                    report.frames += 1;
                    report.samples += self.route(frame, datagram).await;
                }
                Err(err) => {
                    stats.record_malformed();
                    report.malformed += 1;
                    debug!(source = %datagram.source, error = %err, "Malformed frame");
                }
            }
        }
        report
    }

    /// Returns the number of samples recorded.
    async fn route(&self, frame: Frame, datagram: &InboundDatagram) -> usize {
        let c = &self.container;
        let header = frame.header;

        if c.discovery.is_self(header.sender) {
            c.validator.frames().record_self_filtered();
            return 0;
        }

        match c.discovery.observe_frame(&header) {
            SequenceOutcome::Gap { missed } => {
                c.validator.frames().record_gap(missed);
                debug!(provider_id = %header.sender, missed, "Sequence gap");
            }
            SequenceOutcome::Duplicate => c.validator.frames().record_duplicate(),
            SequenceOutcome::First | SequenceOutcome::InOrder | SequenceOutcome::Reordered => {}
        }

        match frame.body {
            MessageBody::Announcement(announcement) => {
                c.discovery
                    .handle_announcement(header.sender, datagram.source, announcement);
                if let Some(provider) = c.registry.get(header.sender) {
                    c.validator.declare_provider(&provider);
                }
                0
            }
            MessageBody::Clear => {
                if c.discovery.handle_clear(header.sender).is_some() {
                    self.forget(header.sender);
                }
                0
            }
            MessageBody::Ping => {
                self.answer_ping(&header, datagram.source).await;
                0
            }
            MessageBody::Pong => {
                trace!(provider_id = %header.sender, "Pong received");
                0
            }
            MessageBody::RequestChannelInfo => {
                trace!(provider_id = %header.sender, "Ignoring channel info request");
                0
            }
            MessageBody::Values(records) => {
                self.handle_values(header.sender, &records, datagram.received_at)
                    .await
            }
        }
    }

    async fn answer_ping(&self, header: &MessageHeader, source: SocketAddr) {
        if self.container.discovery.handle_ping(header, source).await {
            trace!(provider_id = %header.sender, "Ping answered");
        }
    }

    /// Drop per-provider state after the provider left the registry.
    pub fn forget(&self, provider: ProviderId) {
        self.container.validator.forget_provider(provider);
        self.container.sync_table.forget(provider);
    }

    async fn handle_values(
        &self,
        sender: ProviderId,
        records: &[ValueRecord],
        received_at: Timestamp,
    ) -> usize {
        let c = &self.container;
        let stats = c.validator.frames();

        if !c.pin_filter.admit(sender).is_admitted() {
            stats.record_non_provider();
            return 0;
        }

        let mut batch = Vec::with_capacity(records.len());
        for record in records {
            let key = ChannelKey::new(sender, record.channel);
            let Some(info) = c.registry.channel(key) else {
                stats.record_unknown_channel();
                log_channel_event!(trace, "pipeline", "Value for undeclared channel", key);
                continue;
            };

            let time = c.reconciler.reconcile(sender, record.counter, received_at);
            let sample = Sample {
                key,
                timestamp: time.timestamp,
                value: record.value,
                locally_timestamped: time.locally_timestamped,
                received_at,
            };

            if c.validator.record(&sample, &info) == RecordOutcome::OutOfScope {
                // pin moved between admission and recording
                stats.record_non_provider();
                continue;
            }
            c.event_bus.publish(TelemetryEvent::SamplePosted(sample.clone()));
            batch.push(sample);
        }

        let recorded = batch.len();
        if !batch.is_empty() {
            self.forward(batch).await;
        }
        recorded
    }

    async fn forward(&self, batch: Vec<Sample>) {
        let Some(forwarder) = &self.container.forwarder else {
            return;
        };
        let result = self
            .container
            .reliability
            .call(SAMPLE_FORWARDER_BREAKER, forwarder.forward(&batch))
            .await;

        match result {
            Ok(()) => {}
            Err(ReliabilityError::CircuitOpen { .. }) => {
                trace!(samples = batch.len(), "Forwarder circuit open, batch dropped");
            }
            Err(ReliabilityError::Inner(err)) => {
                warn!(samples = batch.len(), error = %err, "Sample forwarding failed");
            }
        }
    }
}

/// Datagrams handed from the dispatcher to one worker.
pub type Lane = mpsc::Receiver<Dequeued<InboundDatagram>>;

/// Datagrams buffered per lane before the dispatcher waits.
pub const LANE_CAPACITY: usize = 64;

/// Lane owning datagrams from `source`.
pub fn lane_for(source: SocketAddr, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    (hasher.finish() % lanes.max(1) as u64) as usize
}

/// Pop and process datagrams until shutdown or until the queue is closed
/// and drained. Used when a single worker owns the whole queue.
pub async fn run_worker(
    worker: usize,
    pipeline: Arc<FramePipeline>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker, "Worker started");
    let queue = Arc::clone(&pipeline.container.queue);

    loop {
        let next = tokio::select! {
            next = queue.pop() => next,
            _ = cancelled(&mut shutdown) => break,
        };
        let Some(dequeued) = next else {
            break;
        };
        handle(worker, &pipeline, dequeued).await;
    }

    debug!(worker, "Worker stopped");
}

/// Pop the queue in order and route each datagram to its source's lane.
pub async fn run_dispatcher(
    pipeline: Arc<FramePipeline>,
    lanes: Vec<mpsc::Sender<Dequeued<InboundDatagram>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(lanes = lanes.len(), "Dispatcher started");
    let queue = Arc::clone(&pipeline.container.queue);

    loop {
        let next = tokio::select! {
            next = queue.pop() => next,
            _ = cancelled(&mut shutdown) => break,
        };
        let Some(dequeued) = next else {
            break;
        };
        let lane = lane_for(dequeued.item.source, lanes.len());
        let sent = tokio::select! {
            sent = lanes[lane].send(dequeued) => sent,
            _ = cancelled(&mut shutdown) => break,
        };
        if sent.is_err() {
            warn!(lane, "Lane worker gone, dispatcher stopping");
            break;
        }
    }

    debug!("Dispatcher stopped");
}

/// Process datagrams from one lane until shutdown or until the dispatcher
/// hangs up.
pub async fn run_lane_worker(
    worker: usize,
    pipeline: Arc<FramePipeline>,
    mut lane: Lane,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker, "Worker started");

    loop {
        let next = tokio::select! {
            next = lane.recv() => next,
            _ = cancelled(&mut shutdown) => break,
        };
        let Some(dequeued) = next else {
            break;
        };
        handle(worker, &pipeline, dequeued).await;
    }

    debug!(worker, "Worker stopped");
}

async fn handle(worker: usize, pipeline: &FramePipeline, dequeued: Dequeued<InboundDatagram>) {
    let queue = &pipeline.container.queue;
    let report = pipeline.process(&dequeued.item).await;
    if report.frames == 0 && report.malformed > 0 {
        queue.mark_failed();
    } else {
        queue.mark_processed();
    }
    trace!(
        worker,
        priority = ?dequeued.priority,
        waited_us = dequeued.waited.as_micros() as u64,
        frames = report.frames,
        samples = report.samples,
        "Datagram processed"
    );
}
