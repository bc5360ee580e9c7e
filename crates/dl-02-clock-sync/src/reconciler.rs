use serde::{Deserialize, Serialize};
use shared_types::{ProviderId, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::TimeSyncSource;

/// Outcome of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciledTime {
    pub timestamp: Timestamp,
    /// No basis existed; `timestamp` is the local receive time.
    pub locally_timestamped: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStats {
    pub synced: u64,
    pub fallback: u64,
}

/// Converts raw counters to timestamps. Never blocks and never fails.
pub struct ClockReconciler {
    sync: Arc<dyn TimeSyncSource>,
    synced: AtomicU64,
    fallback: AtomicU64,
}

impl ClockReconciler {
    pub fn new(sync: Arc<dyn TimeSyncSource>) -> Self {
        Self {
            sync,
            synced: AtomicU64::new(0),
            fallback: AtomicU64::new(0),
        }
    }

    pub fn reconcile(
        &self,
        provider: ProviderId,
        counter: u32,
        received_at: Timestamp,
    ) -> ReconciledTime {
        match self.sync.basis(provider) {
            Some(basis) => {
                self.synced.fetch_add(1, Ordering::Relaxed);
                ReconciledTime {
                    timestamp: basis.apply(counter),
                    locally_timestamped: false,
                }
            }
            None => {
                self.fallback.fetch_add(1, Ordering::Relaxed);
                trace!(provider_id = %provider, counter, "No time basis, using receive time");
                ReconciledTime {
                    timestamp: received_at,
                    locally_timestamped: true,
                }
            }
        }
    }

    pub fn stats(&self) -> ClockStats {
        ClockStats {
            synced: self.synced.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncTable;

    #[test]
    fn test_synced_provider_uses_basis() {
        let table = Arc::new(SyncTable::new());
        table.establish(ProviderId(1), Timestamp(1_000_000), 0);
        let reconciler = ClockReconciler::new(table);

        let t = reconciler.reconcile(ProviderId(1), 2_500, Timestamp(2_000_000));
        assert_eq!(t.timestamp, Timestamp(1_002_500));
        assert!(!t.locally_timestamped);
        assert_eq!(reconciler.stats(), ClockStats { synced: 1, fallback: 0 });
    }

    #[test]
    fn test_unsynced_provider_falls_back_to_receive_time() {
        let table = Arc::new(SyncTable::new());
        table.establish(ProviderId(1), Timestamp(0), 0);
        let reconciler = ClockReconciler::new(table);

        let t = reconciler.reconcile(ProviderId(2), 2_500, Timestamp(777));
        assert_eq!(t.timestamp, Timestamp(777));
        assert!(t.locally_timestamped);
        assert_eq!(reconciler.stats(), ClockStats { synced: 0, fallback: 1 });
    }
}
