//! Bounded, prioritised ingestion queue.
//!
//! The producer (the socket receive loop) never waits. When the queue is
//! full the newest item of the lowest priority is shed:
//!
//! - incoming priority not above the lowest queued priority: the incoming
//!   item is dropped;
//! - otherwise the newest queued item of the lowest priority is evicted to
//!   make room.
//!
//! Either way `dropped` increments and the size stays at capacity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{AlertKind, AlertSeverity};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::alerts::AlertBuffer;

/// Name the queue reports under in alerts and logs.
pub const INGESTION_QUEUE: &str = "ingestion-queue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
}

impl Priority {
    const ALL: [Priority; 3] = [Priority::Low, Priority::Normal, Priority::High];

    fn lane(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub capacity: usize,
    /// Fill ratio at which a watermark alert is raised.
    pub alert_watermark: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            alert_watermark: 0.9,
        }
    }
}

impl QueueConfig {
    pub fn for_testing() -> Self {
        Self {
            capacity: 4,
            alert_watermark: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// The queue was full and the incoming item was shed.
    DroppedIncoming,
    /// The queue was full and a queued item of this priority was shed.
    Evicted(Priority),
}

/// An item handed to a worker.
#[derive(Debug)]
pub struct Dequeued<T> {
    pub item: T,
    pub priority: Priority,
    /// Time spent waiting in the queue.
    pub waited: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub normal: u64,
    pub high: u64,
}

impl PriorityCounts {
    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Normal => self.normal += 1,
            Priority::High => self.high += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub processed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub current_size: usize,
    /// Peak size since creation.
    pub high_watermark: usize,
    pub capacity: usize,
    /// Average time items waited before a worker took them.
    pub avg_latency_ms: f64,
    pub enqueued_by_priority: PriorityCounts,
    pub dropped_by_priority: PriorityCounts,
}

/// Anything that can report ingestion queue statistics.
pub trait QueueStatsSource: Send + Sync {
    fn queue_stats(&self) -> QueueStats;
}

struct Entry<T> {
    item: T,
    enqueued_at: Instant,
}

struct QueueState<T> {
    lanes: [VecDeque<Entry<T>>; 3],
    stats: QueueStats,
    latency_total: Duration,
    latency_samples: u64,
    watermark_alerted: bool,
}

impl<T> QueueState<T> {
    fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    fn lowest_occupied(&self) -> Option<Priority> {
        Priority::ALL
            .into_iter()
            .find(|p| !self.lanes[p.lane()].is_empty())
    }
}

pub struct IngestionQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
    closed: AtomicBool,
    config: QueueConfig,
    alerts: Option<Arc<AlertBuffer>>,
}

impl<T: Send> IngestionQueue<T> {
    pub fn new(config: QueueConfig, alerts: Option<Arc<AlertBuffer>>) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                lanes: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
                stats: QueueStats {
                    capacity,
                    ..QueueStats::default()
                },
                latency_total: Duration::ZERO,
                latency_samples: 0,
                watermark_alerted: false,
            }),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            config: QueueConfig { capacity, ..config },
            alerts,
        }
    }

    /// Enqueue without blocking.
    pub fn push(&self, item: T, priority: Priority) -> PushOutcome {
        let mut state = self.state.lock();
        let mut outcome = PushOutcome::Enqueued;

        if state.len() >= self.config.capacity {
            // lowest_occupied is Some whenever the queue is non-empty.
            let lowest = state.lowest_occupied().unwrap_or(Priority::High);
            if priority <= lowest {
                state.stats.dropped += 1;
                state.stats.dropped_by_priority.bump(priority);
                trace!(?priority, "Ingestion queue full, dropping incoming item");
                return PushOutcome::DroppedIncoming;
            }
            state.lanes[lowest.lane()].pop_back();
            state.stats.dropped += 1;
            state.stats.dropped_by_priority.bump(lowest);
            trace!(?priority, evicted = ?lowest, "Ingestion queue full, evicted queued item");
            outcome = PushOutcome::Evicted(lowest);
        }

        state.lanes[priority.lane()].push_back(Entry {
            item,
            enqueued_at: Instant::now(),
        });
        state.stats.enqueued += 1;
        state.stats.enqueued_by_priority.bump(priority);

        let size = state.len();
        state.stats.current_size = size;
        state.stats.high_watermark = state.stats.high_watermark.max(size);

        let raise_alert = !state.watermark_alerted && self.at_watermark(size);
        if raise_alert {
            state.watermark_alerted = true;
        }
        drop(state);

        if raise_alert {
            if let Some(alerts) = &self.alerts {
                alerts.raise(
                    AlertKind::QueueHighWatermark,
                    AlertSeverity::Warning,
                    INGESTION_QUEUE,
                    format!(
                        "ingestion queue at {size}/{} items",
                        self.config.capacity
                    ),
                );
            }
        }

        self.notify.notify_one();
        outcome
    }

    /// Take the highest-priority, oldest item without waiting.
    pub fn try_pop(&self) -> Option<Dequeued<T>> {
        let mut state = self.state.lock();
        let priority = Priority::ALL
            .into_iter()
            .rev()
            .find(|p| !state.lanes[p.lane()].is_empty())?;
        let entry = state.lanes[priority.lane()].pop_front()?;

        let waited = entry.enqueued_at.elapsed();
        state.latency_total += waited;
        state.latency_samples += 1;

        let size = state.len();
        state.stats.current_size = size;
        if state.watermark_alerted && !self.at_watermark(size) {
            state.watermark_alerted = false;
        }

        Some(Dequeued {
            item: entry.item,
            priority,
            waited,
        })
    }

    /// Wait for the next item. `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Dequeued<T>> {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub fn mark_processed(&self) {
        self.state.lock().stats.processed += 1;
    }

    pub fn mark_failed(&self) {
        self.state.lock().stats.failed += 1;
    }

    /// Stop accepting waits; workers drain what is left and exit.
    pub fn close(&self) {
        debug!(queue = INGESTION_QUEUE, "Closing ingestion queue");
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.avg_latency_ms = if state.latency_samples == 0 {
            0.0
        } else {
            state.latency_total.as_secs_f64() * 1000.0 / state.latency_samples as f64
        };
        stats
    }

    fn at_watermark(&self, size: usize) -> bool {
        size as f64 >= self.config.capacity as f64 * self.config.alert_watermark
    }
}

impl<T: Send> QueueStatsSource for IngestionQueue<T> {
    fn queue_stats(&self) -> QueueStats {
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> IngestionQueue<&'static str> {
        IngestionQueue::new(QueueConfig::for_testing(), None)
    }

    #[test]
    fn test_pops_highest_priority_first_fifo_within_lane() {
        let q = queue();
        q.push("low", Priority::Low);
        q.push("normal-1", Priority::Normal);
        q.push("high", Priority::High);
        q.push("normal-2", Priority::Normal);

        let order: Vec<_> = std::iter::from_fn(|| q.try_pop().map(|d| d.item)).collect();
        assert_eq!(order, vec!["high", "normal-1", "normal-2", "low"]);
    }

    #[test]
    fn test_full_queue_drops_incoming_low_priority() {
        let q = queue();
        for _ in 0..4 {
            assert_eq!(q.push("n", Priority::Normal), PushOutcome::Enqueued);
        }
        assert_eq!(q.push("late", Priority::Normal), PushOutcome::DroppedIncoming);
        assert_eq!(q.push("later", Priority::Low), PushOutcome::DroppedIncoming);

        let stats = q.stats();
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.current_size, 4);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.dropped_by_priority.low, 1);
    }

    #[test]
    fn test_full_queue_evicts_newest_lowest_for_higher_priority() {
        let q = queue();
        q.push("low-old", Priority::Low);
        q.push("low-new", Priority::Low);
        q.push("n1", Priority::Normal);
        q.push("n2", Priority::Normal);

        assert_eq!(q.push("h", Priority::High), PushOutcome::Evicted(Priority::Low));
        assert_eq!(q.len(), 4);

        let order: Vec<_> = std::iter::from_fn(|| q.try_pop().map(|d| d.item)).collect();
        assert_eq!(order, vec!["h", "n1", "n2", "low-old"]);
        assert_eq!(q.stats().dropped, 1);
    }

    #[test]
    fn test_stats_track_peak_and_completion() {
        let q = queue();
        q.push("a", Priority::High);
        q.push("b", Priority::Low);
        q.try_pop();
        q.mark_processed();
        q.try_pop();
        q.mark_failed();

        let stats = q.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.high_watermark, 2);
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.enqueued_by_priority.high, 1);
        assert_eq!(stats.enqueued_by_priority.low, 1);
    }

    #[test]
    fn test_watermark_alert_once_per_crossing() {
        let alerts = Arc::new(AlertBuffer::new(8, None));
        let q = IngestionQueue::new(QueueConfig::for_testing(), Some(alerts.clone()));

        for _ in 0..4 {
            q.push("x", Priority::Normal);
        }
        assert_eq!(alerts.len(), 1);

        q.try_pop();
        q.try_pop();
        q.push("x", Priority::Normal);
        assert_eq!(alerts.len(), 2);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let q = Arc::new(queue());
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await.map(|d| d.item) })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        q.push("late", Priority::Normal);
        assert_eq!(consumer.await.unwrap(), Some("late"));
    }

    #[tokio::test]
    async fn test_close_wakes_idle_workers() {
        let q = Arc::new(queue());
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await.is_none() })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        q.close();
        assert!(consumer.await.unwrap());
    }
}
