//! Per-sender sequence tracking.
//!
//! Sequence numbers are a wrapping `u8` and are used only to count gaps and
//! duplicates; frames are never reordered or rejected because of them.

use std::collections::HashMap;

use parking_lot::Mutex;
use shared_types::ProviderId;

/// Forward distance beyond which a jump is read as going backwards.
const HALF_WINDOW: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// First frame from this sender.
    First,
    InOrder,
    /// `missed` sequence numbers were skipped.
    Gap { missed: u8 },
    Duplicate,
    /// Older than the last frame (late arrival or sender restart).
    Reordered,
}

#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Mutex<HashMap<ProviderId, u8>>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, sender: ProviderId, sequence: u8) -> SequenceOutcome {
        let mut last = self.last.lock();
        let Some(previous) = last.insert(sender, sequence) else {
            return SequenceOutcome::First;
        };

        match sequence.wrapping_sub(previous) {
            0 => SequenceOutcome::Duplicate,
            1 => SequenceOutcome::InOrder,
            distance if distance < HALF_WINDOW => SequenceOutcome::Gap {
                missed: distance - 1,
            },
            _ => SequenceOutcome::Reordered,
        }
    }

    pub fn forget(&self, sender: ProviderId) {
        self.last.lock().remove(&sender);
    }
}
