//! Pin filter consulted by the ingestion workers for every values frame.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{ChannelKey, ProviderId, Timestamp};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::PinError;

/// The active capture session's binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPin {
    pub session_id: Uuid,
    pub provider: ProviderId,
    pub started_at: Timestamp,
}

/// Verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No session is active; every sender passes.
    Unpinned,
    /// Sender is the pinned provider.
    Pinned,
    /// Sender is someone else; the frame must be discarded.
    NonProvider,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        !matches!(self, Admission::NonProvider)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStats {
    /// Frames from the pinned provider in the current session.
    pub admitted: u64,
    /// Frames discarded because another provider sent them.
    pub non_provider: u64,
}

#[derive(Debug, Default)]
pub struct PinFilter {
    pin: RwLock<Option<SessionPin>>,
    admitted: AtomicU64,
    non_provider: AtomicU64,
}

impl PinFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session pinned to `provider`.
    ///
    /// Counters restart from zero for the new session.
    pub fn pin(&self, provider: ProviderId, started_at: Timestamp) -> Result<SessionPin, PinError> {
        if provider.is_broadcast() {
            return Err(PinError::BroadcastProvider);
        }

        let mut pin = self.pin.write();
        if let Some(active) = pin.as_ref() {
            return Err(PinError::AlreadyPinned {
                provider: active.provider,
                session_id: active.session_id,
            });
        }

        let session = SessionPin {
            session_id: Uuid::new_v4(),
            provider,
            started_at,
        };
        self.admitted.store(0, Ordering::Relaxed);
        self.non_provider.store(0, Ordering::Relaxed);
        *pin = Some(session.clone());

        info!(provider_id = %provider, session_id = %session.session_id, "Session pinned");
        Ok(session)
    }

    /// End the active session and return its pin.
    pub fn unpin(&self) -> Result<SessionPin, PinError> {
        let session = self.pin.write().take().ok_or(PinError::NotPinned)?;
        info!(
            provider_id = %session.provider,
            session_id = %session.session_id,
            non_provider = self.non_provider.load(Ordering::Relaxed),
            "Session unpinned"
        );
        Ok(session)
    }

    pub fn current(&self) -> Option<SessionPin> {
        self.pin.read().clone()
    }

    pub fn pinned_provider(&self) -> Option<ProviderId> {
        self.pin.read().as_ref().map(|p| p.provider)
    }

    pub fn is_pinned(&self) -> bool {
        self.pin.read().is_some()
    }

    /// Classify a frame from `sender`, counting it.
    pub fn admit(&self, sender: ProviderId) -> Admission {
        let pin = self.pin.read();
        match pin.as_ref() {
            None => Admission::Unpinned,
            Some(active) if active.provider == sender => {
                self.admitted.fetch_add(1, Ordering::Relaxed);
                Admission::Pinned
            }
            Some(active) => {
                let discarded = self.non_provider.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    provider_id = %sender,
                    pinned = %active.provider,
                    discarded,
                    "Frame from non-pinned provider discarded"
                );
                Admission::NonProvider
            }
        }
    }

    /// Whether `key` belongs to the session's scope. Does not count.
    pub fn in_scope(&self, key: ChannelKey) -> bool {
        self.pin
            .read()
            .as_ref()
            .map_or(true, |active| active.provider == key.provider)
    }

    pub fn stats(&self) -> PinStats {
        PinStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            non_provider: self.non_provider.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ChannelId;

    const A: ProviderId = ProviderId(0x0A);
    const B: ProviderId = ProviderId(0x0B);

    #[test]
    fn test_no_session_admits_everyone() {
        let filter = PinFilter::new();
        assert_eq!(filter.admit(A), Admission::Unpinned);
        assert_eq!(filter.admit(B), Admission::Unpinned);
        assert_eq!(filter.stats(), PinStats::default());
        assert!(filter.in_scope(ChannelKey::new(B, ChannelId(1))));
    }

    #[test]
    fn test_pinned_session_discards_other_senders() {
        let filter = PinFilter::new();
        filter.pin(A, Timestamp(10)).unwrap();

        assert_eq!(filter.admit(A), Admission::Pinned);
        assert_eq!(filter.admit(B), Admission::NonProvider);
        assert_eq!(filter.admit(B), Admission::NonProvider);
        assert!(!Admission::NonProvider.is_admitted());

        assert_eq!(
            filter.stats(),
            PinStats {
                admitted: 1,
                non_provider: 2
            }
        );
        assert!(filter.in_scope(ChannelKey::new(A, ChannelId(1))));
        assert!(!filter.in_scope(ChannelKey::new(B, ChannelId(1))));
    }

    #[test]
    fn test_pin_is_never_replaced_implicitly() {
        let filter = PinFilter::new();
        let first = filter.pin(A, Timestamp(10)).unwrap();

        let err = filter.pin(B, Timestamp(20)).unwrap_err();
        assert_eq!(
            err,
            PinError::AlreadyPinned {
                provider: A,
                session_id: first.session_id
            }
        );
        assert_eq!(filter.pinned_provider(), Some(A));
    }

    #[test]
    fn test_unpin_then_repin_resets_counters() {
        let filter = PinFilter::new();
        filter.pin(A, Timestamp(10)).unwrap();
        filter.admit(B);

        let ended = filter.unpin().unwrap();
        assert_eq!(ended.provider, A);
        assert!(!filter.is_pinned());
        assert_eq!(filter.unpin().unwrap_err(), PinError::NotPinned);

        let second = filter.pin(B, Timestamp(30)).unwrap();
        assert_ne!(second.session_id, ended.session_id);
        assert_eq!(filter.stats().non_provider, 0);
    }

    #[test]
    fn test_broadcast_id_cannot_be_pinned() {
        let filter = PinFilter::new();
        assert_eq!(
            filter.pin(ProviderId::BROADCAST, Timestamp(0)).unwrap_err(),
            PinError::BroadcastProvider
        );
    }
}
