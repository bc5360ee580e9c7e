//! # Clock Sync Subsystem
//!
//! **Subsystem ID:** 2
//!
//! Every value record carries a 32-bit millisecond counter relative to the
//! sender's own clock. A synchronisation exchange (outside this crate) pins
//! that counter to local time for each provider; the result is a
//! [`TimeBasis`] handed to the [`ClockReconciler`] through the
//! [`TimeSyncSource`] port.
//!
//! ## Reconstruction
//!
//! ```text
//! delta     = (counter - counter_offset) as i32   // wrapping
//! timestamp = base_time + delta
//! ```
//!
//! Reading the difference as a signed 32-bit value handles counter wrap and
//! samples taken shortly before the sync point. Without a basis the local
//! receive time is used and the sample is flagged `locally_timestamped`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod reconciler;
mod sync_table;

pub use reconciler::{ClockReconciler, ClockStats, ReconciledTime};
pub use sync_table::SyncTable;

use serde::{Deserialize, Serialize};
use shared_types::{ProviderId, Timestamp};

/// Local time at which a provider's counter read `counter_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBasis {
    pub base_time: Timestamp,
    pub counter_offset: u32,
}

impl TimeBasis {
    pub fn new(base_time: Timestamp, counter_offset: u32) -> Self {
        Self {
            base_time,
            counter_offset,
        }
    }

    /// Map a raw counter onto local time.
    pub fn apply(&self, counter: u32) -> Timestamp {
        let delta = counter.wrapping_sub(self.counter_offset) as i32;
        let base = self.base_time.as_millis();
        let millis = if delta >= 0 {
            base.saturating_add(delta as u64)
        } else {
            base.saturating_sub(delta.unsigned_abs() as u64)
        };
        Timestamp::from_millis(millis)
    }
}

/// Port: where per-provider time bases come from.
pub trait TimeSyncSource: Send + Sync {
    fn basis(&self, provider: ProviderId) -> Option<TimeBasis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_delta() {
        let basis = TimeBasis::new(Timestamp(10_000), 500);
        assert_eq!(basis.apply(1_500), Timestamp(11_000));
    }

    #[test]
    fn test_sample_before_sync_point() {
        let basis = TimeBasis::new(Timestamp(10_000), 500);
        assert_eq!(basis.apply(200), Timestamp(9_700));
    }

    #[test]
    fn test_counter_wrap() {
        let basis = TimeBasis::new(Timestamp(10_000), u32::MAX - 99);
        // 100 ticks to wrap to zero, 50 more after.
        assert_eq!(basis.apply(50), Timestamp(10_150));
    }

    #[test]
    fn test_negative_delta_saturates_at_epoch() {
        let basis = TimeBasis::new(Timestamp(100), 1_000);
        assert_eq!(basis.apply(0), Timestamp(0));
    }
}
