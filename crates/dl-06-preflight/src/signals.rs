//! Matching declared channels to well-known signals by name alias or unit.

use serde::{Deserialize, Serialize};
use shared_types::{ChannelInfo, Provider, Unit};

/// A signal preflight looks for, e.g. "RPM".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub label: String,
    /// Normalised name prefixes that identify the signal.
    pub aliases: Vec<String>,
    /// A channel declaring this unit matches regardless of name.
    pub unit: Option<Unit>,
    /// Plausible inclusive range checked during sampling.
    pub range: Option<(f32, f32)>,
}

impl SignalSpec {
    pub fn new(label: &str, aliases: &[&str], unit: Option<Unit>) -> Self {
        Self {
            label: label.to_string(),
            aliases: aliases.iter().map(|a| normalize(a)).collect(),
            unit,
            range: None,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn matches(&self, channel: &ChannelInfo) -> bool {
        if self.unit.is_some_and(|unit| unit == channel.unit) {
            return true;
        }
        let name = normalize(&channel.name);
        !name.is_empty() && self.aliases.iter().any(|alias| name.starts_with(alias.as_str()))
    }

    /// Every matching channel of `provider`, in channel id order.
    pub fn find<'a>(&self, provider: &'a Provider) -> Vec<&'a ChannelInfo> {
        provider
            .channels
            .values()
            .filter(|channel| self.matches(channel))
            .collect()
    }

    pub fn rpm() -> Self {
        Self::new("RPM", &["rpm", "enginespeed", "engspeed"], Some(Unit::EngineSpeed))
            .with_range(0.0, 20_000.0)
    }

    pub fn afr() -> Self {
        Self::new("AFR", &["afr", "airfuel", "wideband"], Some(Unit::Afr)).with_range(10.0, 20.0)
    }

    pub fn map() -> Self {
        Self::new("MAP", &["map", "manifold", "boost"], None)
    }

    pub fn tps() -> Self {
        Self::new("TPS", &["tps", "throttle"], None)
    }

    pub fn torque() -> Self {
        Self::new("Torque", &["torque", "tq"], Some(Unit::Torque))
    }

    pub fn power() -> Self {
        Self::new("Power", &["power", "hp", "kw"], Some(Unit::Power))
    }
}

/// Lowercase ASCII alphanumerics only: "Engine Speed" -> "enginespeed".
fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
