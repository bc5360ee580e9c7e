use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use shared_types::{ChannelInfo, ChannelKey, Provider, ProviderId, Timestamp};
use uuid::Uuid;

use crate::metrics::{ChannelMetrics, ChannelMetricsSnapshot};

/// Per-key locked metrics. The outer lock only guards membership.
#[derive(Debug, Default)]
pub(crate) struct MetricsTable {
    entries: RwLock<HashMap<ChannelKey, Arc<Mutex<ChannelMetrics>>>>,
}

impl MetricsTable {
    pub(crate) fn entry(&self, key: ChannelKey, info: &ChannelInfo) -> Arc<Mutex<ChannelMetrics>> {
        if let Some(existing) = self.entries.read().get(&key) {
            return Arc::clone(existing);
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(ChannelMetrics::new(key, info.clone())))),
        )
    }

    pub(crate) fn get(&self, key: ChannelKey) -> Option<Arc<Mutex<ChannelMetrics>>> {
        self.entries.read().get(&key).cloned()
    }

    /// Make the table mirror `provider`'s declared channel set.
    pub(crate) fn declare(&self, provider: &Provider) {
        let mut entries = self.entries.write();
        entries.retain(|key, _| key.provider != provider.id || provider.channels.contains_key(&key.channel));
        for (id, info) in &provider.channels {
            let key = ChannelKey::new(provider.id, *id);
            match entries.get(&key) {
                Some(existing) => existing.lock().redeclare(info.clone()),
                None => {
                    entries.insert(key, Arc::new(Mutex::new(ChannelMetrics::new(key, info.clone()))));
                }
            }
        }
    }

    pub(crate) fn forget(&self, provider: ProviderId) {
        self.entries.write().retain(|key, _| key.provider != provider);
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    /// Snapshots sorted by key, optionally for one provider.
    pub(crate) fn snapshots(
        &self,
        provider: Option<ProviderId>,
        now: Timestamp,
        window: Duration,
    ) -> Vec<ChannelMetricsSnapshot> {
        let handles: Vec<_> = self
            .entries
            .read()
            .iter()
            .filter(|(key, _)| provider.map_or(true, |p| key.provider == p))
            .map(|(_, m)| Arc::clone(m))
            .collect();

        let mut snapshots: Vec<_> = handles
            .iter()
            .map(|m| m.lock().snapshot(now, window))
            .collect();
        snapshots.sort_by_key(|s| s.key);
        snapshots
    }
}

/// A capture bound to one provider; owns that provider's channel metrics.
#[derive(Debug)]
pub struct CaptureSession {
    pub session_id: Uuid,
    pub provider: ProviderId,
    pub started_at: Timestamp,
    pub(crate) metrics: MetricsTable,
}

impl CaptureSession {
    pub(crate) fn new(session_id: Uuid, provider: &Provider, started_at: Timestamp) -> Self {
        let metrics = MetricsTable::default();
        metrics.declare(provider);
        Self {
            session_id,
            provider: provider.id,
            started_at,
            metrics,
        }
    }
}

/// Final metrics of a stopped session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub session_id: Uuid,
    pub provider: ProviderId,
    pub started_at: Timestamp,
    pub stopped_at: Timestamp,
    pub channels: Vec<ChannelMetricsSnapshot>,
}
