//! # Telemetry Events
//!
//! Every notification that flows through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::{Alert, ProviderId, Sample};
use std::fmt;
use uuid::Uuid;

/// Why a provider left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearReason {
    /// The provider broadcast a clear message.
    Explicit,
    /// Nothing was heard from the provider within the provider timeout.
    Timeout,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    // =========================================================================
    // DISCOVERY
    // =========================================================================
    /// First announcement from a provider.
    ProviderDiscovered {
        provider_id: ProviderId,
        name: String,
        channel_count: usize,
    },

    /// A known provider re-announced; its name and channels were replaced.
    ProviderUpdated {
        provider_id: ProviderId,
        previous_name: String,
        name: String,
        channel_count: usize,
    },

    /// A provider was evicted. `name` is the last name it declared.
    ProviderCleared {
        provider_id: ProviderId,
        name: String,
        reason: ClearReason,
    },

    // =========================================================================
    // SAMPLES
    // =========================================================================
    /// A sample passed pinning and validation bookkeeping.
    SamplePosted(Sample),

    // =========================================================================
    // SESSION
    // =========================================================================
    SessionStarted {
        session_id: Uuid,
        provider_id: ProviderId,
    },

    SessionStopped {
        session_id: Uuid,
        provider_id: ProviderId,
    },

    // =========================================================================
    // RELIABILITY
    // =========================================================================
    AlertRaised(Alert),
}

impl TelemetryEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ProviderDiscovered { .. }
            | Self::ProviderUpdated { .. }
            | Self::ProviderCleared { .. } => EventTopic::Discovery,
            Self::SamplePosted(_) => EventTopic::Samples,
            Self::SessionStarted { .. } | Self::SessionStopped { .. } => EventTopic::Session,
            Self::AlertRaised(_) => EventTopic::Alerts,
        }
    }

    /// Provider the event concerns, if any.
    #[must_use]
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::ProviderDiscovered { provider_id, .. }
            | Self::ProviderUpdated { provider_id, .. }
            | Self::ProviderCleared { provider_id, .. }
            | Self::SessionStarted { provider_id, .. }
            | Self::SessionStopped { provider_id, .. } => Some(*provider_id),
            Self::SamplePosted(sample) => Some(sample.key.provider),
            Self::AlertRaised(_) => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    Discovery,
    Samples,
    Session,
    Alerts,
    /// Wildcard.
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Providers to include. Empty means all providers; events without a
    /// provider only pass an empty provider list.
    pub providers: Vec<ProviderId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            providers: Vec::new(),
        }
    }

    /// Narrow the filter to one provider.
    #[must_use]
    pub fn for_provider(mut self, provider: ProviderId) -> Self {
        self.providers.push(provider);
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &TelemetryEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let provider_match = self.providers.is_empty()
            || event
                .provider()
                .is_some_and(|provider| self.providers.contains(&provider));

        topic_match && provider_match
    }
}
