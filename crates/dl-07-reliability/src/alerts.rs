//! Bounded buffer of recent alerts, mirrored onto the event bus.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::{EventPublisher, TelemetryEvent};
use shared_types::{Alert, AlertKind, AlertSeverity};
use tracing::warn;

pub struct AlertBuffer {
    recent: Mutex<VecDeque<Alert>>,
    capacity: usize,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl AlertBuffer {
    pub fn new(capacity: usize, publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
            publisher,
        }
    }

    pub fn raise(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        source: &str,
        message: impl Into<String>,
    ) -> Alert {
        let alert = Alert::new(kind, severity, source, message);
        warn!(
            alert_id = %alert.id,
            kind = %alert.kind,
            severity = ?alert.severity,
            source = %alert.source,
            "{}",
            alert.message
        );

        {
            let mut recent = self.recent.lock();
            if recent.len() >= self.capacity {
                recent.pop_front();
            }
            recent.push_back(alert.clone());
        }

        if let Some(publisher) = &self.publisher {
            publisher.publish(TelemetryEvent::AlertRaised(alert.clone()));
        }
        alert
    }

    /// Most recent alerts, oldest first.
    pub fn recent(&self) -> Vec<Alert> {
        self.recent.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.lock().is_empty()
    }
}
