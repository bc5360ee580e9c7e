use parking_lot::RwLock;
use shared_types::{ProviderId, Timestamp};
use std::collections::HashMap;
use tracing::debug;

use crate::{TimeBasis, TimeSyncSource};

/// In-process store of established time bases.
///
/// Whatever performs the sync exchange writes here; the reconciler only
/// reads.
#[derive(Debug, Default)]
pub struct SyncTable {
    bases: RwLock<HashMap<ProviderId, TimeBasis>>,
}

impl SyncTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `provider`'s counter read `counter` at local `at`.
    pub fn establish(&self, provider: ProviderId, at: Timestamp, counter: u32) {
        debug!(provider_id = %provider, base_time = %at, counter, "Time basis established");
        self.bases
            .write()
            .insert(provider, TimeBasis::new(at, counter));
    }

    /// Drop a provider's basis, e.g. when it leaves the registry.
    pub fn forget(&self, provider: ProviderId) -> Option<TimeBasis> {
        self.bases.write().remove(&provider)
    }

    pub fn len(&self) -> usize {
        self.bases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.read().is_empty()
    }
}

impl TimeSyncSource for SyncTable {
    fn basis(&self, provider: ProviderId) -> Option<TimeBasis> {
        self.bases.read().get(&provider).copied()
    }
}
