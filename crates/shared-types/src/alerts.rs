//! # Alerts
//!
//! Structured, timestamped alerts raised by the reliability layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// What raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// A named circuit breaker transitioned to open.
    CircuitOpened,
    /// A dependency health monitor classified its dependency unhealthy.
    DependencyUnhealthy,
    /// The ingestion queue reached its alert watermark.
    QueueHighWatermark,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpened => write!(f, "circuit-opened"),
            Self::DependencyUnhealthy => write!(f, "dependency-unhealthy"),
            Self::QueueHighWatermark => write!(f, "queue-high-watermark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub raised_at: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub kind: AlertKind,
    /// Breaker, dependency or queue name.
    pub source: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        severity: AlertSeverity,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            raised_at: Utc::now(),
            severity,
            kind,
            source: source.into(),
            message: message.into(),
        }
    }
}
