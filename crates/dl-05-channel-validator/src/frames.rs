//! Frame-level counters shared by the receive loop and the workers.
//!
//! `total` counts every frame the pipeline took responsibility for,
//! including ones shed by the ingestion queue, so the drop ratio stays
//! within `[0, 1]`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct FrameStats {
    total: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
    non_provider: AtomicU64,
    self_filtered: AtomicU64,
    unknown_channel: AtomicU64,
    sequence_gaps: AtomicU64,
    duplicates: AtomicU64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame decoded successfully.
    pub fn record_frame(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame failed to decode.
    pub fn record_malformed(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// A datagram shed by the ingestion queue before decoding.
    pub fn record_dropped(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_non_provider(&self) {
        self.non_provider.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_self_filtered(&self) {
        self.self_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// A value record referenced a key missing from the registry.
    pub fn record_unknown_channel(&self) {
        self.unknown_channel.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gap(&self, missed: u8) {
        self.sequence_gaps
            .fetch_add(u64::from(missed), Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            non_provider: self.non_provider.load(Ordering::Relaxed),
            self_filtered: self.self_filtered.load(Ordering::Relaxed),
            unknown_channel: self.unknown_channel.load(Ordering::Relaxed),
            sequence_gaps: self.sequence_gaps.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStatsSnapshot {
    pub total: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub non_provider: u64,
    pub self_filtered: u64,
    pub unknown_channel: u64,
    pub sequence_gaps: u64,
    pub duplicates: u64,
}

impl FrameStatsSnapshot {
    /// `(dropped + malformed + non_provider) / total`, 0 with no traffic.
    pub fn drop_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let lost = self.dropped + self.malformed + self.non_provider;
        lost as f64 / self.total as f64
    }
}
