//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `ProviderId`, `ChannelId`, `ChannelKey`
//! - **Catalog**: `Unit`, `ChannelInfo`, `Provider`
//! - **Stream**: `Timestamp`, `Sample`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Network identifier of a broadcasting node (the wire header's sender id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub u16);

impl ProviderId {
    /// Destination id meaning "every host on the segment".
    pub const BROADCAST: Self = Self(0xFFFF);

    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Channel identifier, unique only within one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u16);

impl ChannelId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite channel identity.
///
/// The only valid way to address a channel: two providers may both declare
/// channel 1 as "RPM" and their streams must never be conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    pub provider: ProviderId,
    pub channel: ChannelId,
}

impl ChannelKey {
    pub fn new(provider: ProviderId, channel: ChannelId) -> Self {
        Self { provider, channel }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.channel)
    }
}

// =============================================================================
// CLUSTER B: CATALOG
// =============================================================================

/// Engineering unit declared for a channel (one wire byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Time,
    Distance,
    Speed,
    Force,
    Power,
    Torque,
    Temperature,
    Pressure,
    EngineSpeed,
    GearRatio,
    Acceleration,
    Afr,
    FlowRate,
    Lambda,
    Volts,
    Amps,
    Percentage,
    Extended,
    NoUnit,
    /// Unit byte not known to this implementation, preserved verbatim.
    Other(u8),
}

impl Unit {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Time,
            1 => Self::Distance,
            2 => Self::Speed,
            3 => Self::Force,
            4 => Self::Power,
            5 => Self::Torque,
            6 => Self::Temperature,
            7 => Self::Pressure,
            8 => Self::EngineSpeed,
            9 => Self::GearRatio,
            10 => Self::Acceleration,
            11 => Self::Afr,
            12 => Self::FlowRate,
            13 => Self::Lambda,
            14 => Self::Volts,
            15 => Self::Amps,
            16 => Self::Percentage,
            254 => Self::Extended,
            255 => Self::NoUnit,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Time => 0,
            Self::Distance => 1,
            Self::Speed => 2,
            Self::Force => 3,
            Self::Power => 4,
            Self::Torque => 5,
            Self::Temperature => 6,
            Self::Pressure => 7,
            Self::EngineSpeed => 8,
            Self::GearRatio => 9,
            Self::Acceleration => 10,
            Self::Afr => 11,
            Self::FlowRate => 12,
            Self::Lambda => 13,
            Self::Volts => 14,
            Self::Amps => 15,
            Self::Percentage => 16,
            Self::Extended => 254,
            Self::NoUnit => 255,
            Self::Other(code) => *code,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => write!(f, "time"),
            Self::Distance => write!(f, "distance"),
            Self::Speed => write!(f, "speed"),
            Self::Force => write!(f, "force"),
            Self::Power => write!(f, "power"),
            Self::Torque => write!(f, "torque"),
            Self::Temperature => write!(f, "temperature"),
            Self::Pressure => write!(f, "pressure"),
            Self::EngineSpeed => write!(f, "engine-speed"),
            Self::GearRatio => write!(f, "gear-ratio"),
            Self::Acceleration => write!(f, "acceleration"),
            Self::Afr => write!(f, "afr"),
            Self::FlowRate => write!(f, "flow-rate"),
            Self::Lambda => write!(f, "lambda"),
            Self::Volts => write!(f, "volts"),
            Self::Amps => write!(f, "amps"),
            Self::Percentage => write!(f, "percentage"),
            Self::Extended => write!(f, "extended"),
            Self::NoUnit => write!(f, "none"),
            Self::Other(code) => write!(f, "unit-{}", code),
        }
    }
}

/// A channel as declared in a provider's announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub unit: Unit,
    /// Vendor-specific byte, carried but not interpreted.
    pub vendor: u8,
}

impl ChannelInfo {
    pub fn new(id: ChannelId, name: impl Into<String>, unit: Unit) -> Self {
        Self {
            id,
            name: name.into(),
            unit,
            vendor: 0,
        }
    }
}

/// A broadcasting node and the channel set it last declared.
///
/// The name and channel map are replaced wholesale on every announcement
/// (last writer wins); nothing is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub address: SocketAddr,
    pub name: String,
    pub channels: BTreeMap<ChannelId, ChannelInfo>,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    /// Number of announcements received from this provider.
    pub announcements: u64,
}

impl Provider {
    pub fn channel(&self, id: ChannelId) -> Option<&ChannelInfo> {
        self.channels.get(&id)
    }

    /// Composite keys for every declared channel, in channel id order.
    pub fn channel_keys(&self) -> Vec<ChannelKey> {
        self.channels
            .keys()
            .map(|channel| ChannelKey::new(self.id, *channel))
            .collect()
    }
}

// =============================================================================
// CLUSTER C: STREAM
// =============================================================================

/// Millisecond-resolution point in time.
///
/// Local times come from a [`crate::TimeSource`]; reconstructed sample times
/// are expressed on the same scale once a provider's clock is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    pub fn saturating_add(&self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_millis() as u64))
    }

    pub fn saturating_sub(&self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(duration.as_millis() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// One decoded, scoped and time-reconciled channel value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub key: ChannelKey,
    /// Reconstructed sample time.
    pub timestamp: Timestamp,
    pub value: f32,
    /// `true` when no clock sync existed and `timestamp` is the local
    /// receive time (degraded fidelity).
    pub locally_timestamped: bool,
    /// Local time the carrying frame was received.
    pub received_at: Timestamp,
}
