//! # Time Source Port
//!
//! Components never read the wall clock directly; they are handed an
//! `Arc<dyn TimeSource>` so tests can drive time deterministically.

use crate::entities::Timestamp;

/// Abstract interface for reading the current local time.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Production time source using the system clock (Unix milliseconds).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        Timestamp::from_millis(duration.as_millis() as u64)
    }
}

#[cfg(feature = "test-utils")]
mod manual {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Thread-safe time source for tests requiring time advancement.
    ///
    /// ```rust
    /// use shared_types::{ManualTimeSource, TimeSource};
    /// use std::time::Duration;
    ///
    /// let clock = ManualTimeSource::new(1_000);
    /// clock.advance(Duration::from_millis(500));
    /// assert_eq!(clock.now().as_millis(), 1_500);
    /// ```
    #[derive(Debug, Default)]
    pub struct ManualTimeSource {
        millis: AtomicU64,
    }

    impl ManualTimeSource {
        pub fn new(initial_millis: u64) -> Self {
            Self {
                millis: AtomicU64::new(initial_millis),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.millis
                .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }

        pub fn set(&self, millis: u64) {
            self.millis.store(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for ManualTimeSource {
        fn now(&self) -> Timestamp {
            Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
        }
    }
}

#[cfg(feature = "test-utils")]
pub use manual::ManualTimeSource;
