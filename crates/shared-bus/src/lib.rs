//! # Shared Bus - Event Bus for Pipeline Notifications
//!
//! Carries the notifications other parts of the system react to: provider
//! discovered/updated/cleared, validated samples, session lifecycle and
//! reliability alerts.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Receive path │                    │  Consumers   │
//! │              │    publish()       │ (preflight,  │
//! │              │ ──────┐            │  storage, UI)│
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │  (bounded)   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Backpressure
//!
//! The bus is a bounded broadcast ring. Publishing never waits: a subscriber
//! that falls behind loses the oldest events and the loss is counted on its
//! [`Subscription`], so a slow consumer can never stall the receive path.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{ClearReason, EventFilter, EventTopic, TelemetryEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are overwritten.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;
