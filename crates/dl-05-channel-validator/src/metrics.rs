//! Rolling metrics for one scoped channel.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::{ChannelInfo, ChannelKey, Sample, Timestamp, Unit};

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    received_at: Timestamp,
    valid: bool,
}

/// Metrics for one `(provider, channel)` key.
///
/// Always held behind its own lock by the validator; every method takes
/// the full update or read in one go.
#[derive(Debug, Clone)]
pub struct ChannelMetrics {
    key: ChannelKey,
    info: ChannelInfo,
    window: VecDeque<WindowEntry>,
    last_value: Option<f32>,
    last_timestamp: Option<Timestamp>,
    last_received_at: Option<Timestamp>,
    locally_timestamped: bool,
    total: u64,
    invalid: u64,
}

impl ChannelMetrics {
    pub fn new(key: ChannelKey, info: ChannelInfo) -> Self {
        Self {
            key,
            info,
            window: VecDeque::new(),
            last_value: None,
            last_timestamp: None,
            last_received_at: None,
            locally_timestamped: false,
            total: 0,
            invalid: 0,
        }
    }

    pub fn key(&self) -> ChannelKey {
        self.key
    }

    pub fn info(&self) -> &ChannelInfo {
        &self.info
    }

    /// Replace the declared name/unit after a re-announcement.
    pub fn redeclare(&mut self, info: ChannelInfo) {
        self.info = info;
    }

    pub fn record(&mut self, sample: &Sample, valid: bool, window: Duration, max_samples: usize) {
        self.total += 1;
        if !valid {
            self.invalid += 1;
        }
        let entry = WindowEntry {
            received_at: sample.received_at,
            valid,
        };
        // a late sample counts, but never replaces a newer last value
        if self.last_received_at.is_some_and(|last| sample.received_at < last) {
            let at = self
                .window
                .partition_point(|e| e.received_at <= sample.received_at);
            self.window.insert(at, entry);
        } else {
            self.last_value = Some(sample.value);
            self.last_timestamp = Some(sample.timestamp);
            self.last_received_at = Some(sample.received_at);
            self.locally_timestamped = sample.locally_timestamped;
            self.window.push_back(entry);
        }

        let newest = self.last_received_at.unwrap_or(sample.received_at);
        let horizon = newest.saturating_sub(window);
        while self
            .window
            .front()
            .is_some_and(|e| e.received_at < horizon)
            || self.window.len() > max_samples
        {
            self.window.pop_front();
        }
    }

    fn in_window(&self, now: Timestamp, window: Duration) -> impl Iterator<Item = &WindowEntry> {
        let horizon = now.saturating_sub(window);
        self.window.iter().filter(move |e| e.received_at >= horizon)
    }

    /// Samples per second from inter-arrival spacing inside the window.
    ///
    /// Fewer than two samples in the window reads as 0 Hz.
    pub fn rate_hz(&self, now: Timestamp, window: Duration) -> f64 {
        let mut entries = self.in_window(now, window);
        let Some(first) = entries.next() else {
            return 0.0;
        };
        let (count, last) = entries.fold((1u64, first.received_at), |(n, _), e| {
            (n + 1, e.received_at)
        });
        if count < 2 {
            return 0.0;
        }
        let span_ms = last.as_millis().saturating_sub(first.received_at.as_millis()).max(1);
        (count - 1) as f64 * 1000.0 / span_ms as f64
    }

    /// Share of invalid samples inside the window.
    pub fn invalid_ratio(&self, now: Timestamp, window: Duration) -> f64 {
        let (total, invalid) = self
            .in_window(now, window)
            .fold((0u64, 0u64), |(t, i), e| (t + 1, i + u64::from(!e.valid)));
        if total == 0 {
            0.0
        } else {
            invalid as f64 / total as f64
        }
    }

    pub fn age(&self, now: Timestamp) -> Option<Duration> {
        self.last_received_at
            .map(|at| now.saturating_duration_since(at))
    }

    pub fn snapshot(&self, now: Timestamp, window: Duration) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            key: self.key,
            name: self.info.name.clone(),
            unit: self.info.unit,
            last_value: self.last_value,
            last_timestamp: self.last_timestamp,
            last_received_at: self.last_received_at,
            locally_timestamped: self.locally_timestamped,
            rate_hz: self.rate_hz(now, window),
            invalid_ratio: self.invalid_ratio(now, window),
            invalid_count: self.invalid,
            total_count: self.total,
        }
    }
}

/// Point-in-time copy handed to readers and external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetricsSnapshot {
    pub key: ChannelKey,
    pub name: String,
    pub unit: Unit,
    pub last_value: Option<f32>,
    pub last_timestamp: Option<Timestamp>,
    pub last_received_at: Option<Timestamp>,
    pub locally_timestamped: bool,
    pub rate_hz: f64,
    pub invalid_ratio: f64,
    pub invalid_count: u64,
    pub total_count: u64,
}
