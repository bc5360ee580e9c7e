//! Preflight verdicts, per-check results and operator overrides.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::ProviderId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Connectivity = 1,
    RequiredChannels = 2,
    RecommendedChannels = 3,
    HealthThresholds = 4,
    Semantic = 5,
}

impl Stage {
    /// Only these stages decide pass/fail.
    pub fn gates_verdict(self) -> bool {
        matches!(self, Stage::Connectivity | Stage::RequiredChannels)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connectivity => "connectivity",
            Stage::RequiredChannels => "required-channels",
            Stage::RecommendedChannels => "recommended-channels",
            Stage::HealthThresholds => "health-thresholds",
            Stage::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub stage: Stage,
    pub passed: bool,
    pub severity: CheckSeverity,
    pub message: String,
    pub fix_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_max: Option<f64>,
    /// Run-time measurement behind the check (age in ms, rate in Hz, drop
    /// ratio). Varies between replays of the same stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<f64>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage,
            passed: true,
            severity: CheckSeverity::Info,
            message: message.into(),
            fix_hint: None,
            observed_min: None,
            observed_max: None,
            measured: None,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        stage: Stage,
        severity: CheckSeverity,
        message: impl Into<String>,
        fix_hint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stage,
            passed: false,
            severity,
            message: message.into(),
            fix_hint: Some(fix_hint.into()),
            observed_min: None,
            observed_max: None,
            measured: None,
        }
    }

    pub fn with_observed(mut self, min: f64, max: f64) -> Self {
        self.observed_min = Some(min);
        self.observed_max = Some(max);
        self
    }

    pub fn with_measured(mut self, value: f64) -> Self {
        self.measured = Some(value);
        self
    }

    /// Same outcome: name, stage, pass/fail, severity and hint. Messages
    /// and measurements are free to differ.
    pub fn same_outcome(&self, other: &CheckResult) -> bool {
        self.name == other.name
            && self.stage == other.stage
            && self.passed == other.passed
            && self.severity == other.severity
            && self.fix_hint == other.fix_hint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisKind {
    /// A channel's values do not fit its declared meaning.
    SuspectedMislabel,
    /// Two channels look like each other's signal.
    SwappedChannels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub kind: HypothesisKind,
    pub channels: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreflightMode {
    /// A failing verdict prevents capture.
    Blocking,
    /// A failing verdict may be overridden explicitly.
    Advisory,
}

/// An operator's explicit decision to capture despite a failing verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub operator: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    #[error("preflight passed; nothing to override")]
    NotFailed,

    #[error("blocking preflight cannot be overridden")]
    Blocking,

    #[error("override already recorded by {0}")]
    AlreadyOverridden(String),

    #[error("override requires an operator and a reason")]
    MissingJustification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightResult {
    pub passed: bool,
    pub provider_id: Option<ProviderId>,
    pub provider_name: Option<String>,
    pub mode: PreflightMode,
    pub checks: Vec<CheckResult>,
    /// Labels of required signals with no matching channel.
    pub missing_channels: Vec<String>,
    /// Labels of recommended signals with no matching channel.
    pub recommended_missing: Vec<String>,
    pub hypotheses: Vec<Hypothesis>,
    pub can_override: bool,
    /// Cancelled before the windows elapsed; later checks saw partial data.
    pub incomplete: bool,
    pub evaluated_at: DateTime<Utc>,
    pub override_record: Option<OverrideRecord>,
}

impl PreflightResult {
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn stages_run(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.checks.iter().map(|c| c.stage).collect();
        stages.dedup();
        stages
    }

    /// Whether a capture may start on this result.
    pub fn permits_capture(&self) -> bool {
        self.passed || self.override_record.is_some()
    }

    /// Record an explicit override of a failing advisory verdict.
    pub fn record_override(
        &mut self,
        operator: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<&OverrideRecord, OverrideError> {
        if self.passed {
            return Err(OverrideError::NotFailed);
        }
        if !self.can_override {
            return Err(OverrideError::Blocking);
        }
        if let Some(existing) = &self.override_record {
            return Err(OverrideError::AlreadyOverridden(existing.operator.clone()));
        }
        if operator.trim().is_empty() || reason.trim().is_empty() {
            return Err(OverrideError::MissingJustification);
        }

        Ok(self.override_record.insert(OverrideRecord {
            operator: operator.to_string(),
            reason: reason.to_string(),
            at,
        }))
    }

    /// Same verdict and checklist, ignoring timestamps, measurements and
    /// overrides.
    pub fn same_verdict(&self, other: &PreflightResult) -> bool {
        self.passed == other.passed
            && self.provider_id == other.provider_id
            && self.mode == other.mode
            && self.checks.len() == other.checks.len()
            && self
                .checks
                .iter()
                .zip(&other.checks)
                .all(|(a, b)| a.same_outcome(b))
            && self.missing_channels == other.missing_channels
            && self.recommended_missing == other.recommended_missing
            && self
                .hypotheses
                .iter()
                .map(|h| (h.kind, &h.channels))
                .eq(other.hypotheses.iter().map(|h| (h.kind, &h.channels)))
            && self.can_override == other.can_override
            && self.incomplete == other.incomplete
    }
}
