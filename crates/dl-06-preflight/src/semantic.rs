//! Stage 5: plausibility over an active sampling window.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{ChannelInfo, ChannelKey, Sample, Timestamp};

use crate::config::CrossSignalConfig;
use crate::result::{CheckResult, CheckSeverity, Hypothesis, HypothesisKind, Stage};
use crate::signals::SignalSpec;

/// Samples collected during the active window, per key, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleWindow {
    samples: BTreeMap<ChannelKey, Vec<(Timestamp, f32)>>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: &Sample) {
        self.samples
            .entry(sample.key)
            .or_default()
            .push((sample.timestamp, sample.value));
    }

    pub fn get(&self, key: ChannelKey) -> &[(Timestamp, f32)] {
        self.samples.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn extremes(values: &[(Timestamp, f32)]) -> Option<(f32, f32)> {
    values.iter().fold(None, |acc, &(_, v)| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Range and frozen-signal checks for one required channel.
pub(crate) fn signal_checks(
    spec: &SignalSpec,
    channel: &ChannelInfo,
    values: &[(Timestamp, f32)],
    hypotheses: &mut Vec<Hypothesis>,
) -> Vec<CheckResult> {
    let label = &spec.label;
    let range_name = format!("{label} range");
    let frozen_name = format!("{label} frozen");

    let Some((min, max)) = extremes(values) else {
        let message = format!("no {} samples during the sampling window", channel.name);
        let hint = "confirm the channel is streaming and the dyno is running";
        return vec![
            CheckResult::fail(&range_name, Stage::Semantic, CheckSeverity::Warning, &message, hint),
            CheckResult::fail(&frozen_name, Stage::Semantic, CheckSeverity::Warning, &message, hint),
        ];
    };

    let has_non_finite = values.iter().any(|(_, v)| !v.is_finite());
    let range = match spec.range {
        Some((lo, hi)) if has_non_finite || min < lo || max > hi => CheckResult::fail(
            &range_name,
            Stage::Semantic,
            CheckSeverity::Error,
            format!(
                "{} outside [{lo}, {hi}]: observed min {min:.1}, max {max:.1}",
                channel.name
            ),
            format!("check the {label} sensor wiring, calibration and declared unit"),
        ),
        Some((lo, hi)) => CheckResult::pass(
            &range_name,
            Stage::Semantic,
            format!("{} within [{lo}, {hi}]", channel.name),
        ),
        None if has_non_finite => CheckResult::fail(
            &range_name,
            Stage::Semantic,
            CheckSeverity::Error,
            format!("{} produced non-finite values", channel.name),
            "check the sensor for faults",
        ),
        None => CheckResult::pass(&range_name, Stage::Semantic, "no range declared"),
    }
    .with_observed(f64::from(min), f64::from(max));

    if spec.label == "AFR" && !range.passed && max <= 2.0 && min >= 0.5 {
        hypotheses.push(Hypothesis {
            kind: HypothesisKind::SuspectedMislabel,
            channels: vec![channel.name.clone()],
            message: format!("{} values look like lambda, not AFR", channel.name),
        });
    }

    let frozen = if values.len() >= 2 && min == max {
        CheckResult::fail(
            &frozen_name,
            Stage::Semantic,
            CheckSeverity::Error,
            format!("{label} frozen at {min} for the whole sampling window"),
            format!("{} is not varying; the sensor or its source may be stuck", channel.name),
        )
    } else if values.len() < 2 {
        CheckResult::pass(&frozen_name, Stage::Semantic, "not enough samples to judge variance")
    } else {
        CheckResult::pass(&frozen_name, Stage::Semantic, format!("{} is varying", channel.name))
    }
    .with_observed(f64::from(min), f64::from(max));

    vec![range, frozen]
}

/// Mean value per time bin.
fn binned(values: &[(Timestamp, f32)], bin_ms: u64) -> BTreeMap<u64, f64> {
    let mut sums: BTreeMap<u64, (f64, u32)> = BTreeMap::new();
    for &(at, value) in values {
        if !value.is_finite() {
            continue;
        }
        let slot = sums.entry(at.as_millis() / bin_ms).or_default();
        slot.0 += f64::from(value);
        slot.1 += 1;
    }
    sums.into_iter()
        .map(|(bin, (sum, n))| (bin, sum / f64::from(n)))
        .collect()
}

fn median(mut errors: Vec<f64>) -> f64 {
    errors.sort_by(f64::total_cmp);
    let mid = errors.len() / 2;
    if errors.len() % 2 == 0 {
        (errors[mid - 1] + errors[mid]) / 2.0
    } else {
        errors[mid]
    }
}

pub(crate) struct CrossSignalInput<'a> {
    pub rpm: (&'a ChannelInfo, &'a [(Timestamp, f32)]),
    pub torque: (&'a ChannelInfo, &'a [(Timestamp, f32)]),
    pub power: (&'a ChannelInfo, &'a [(Timestamp, f32)]),
}

/// `power ≈ torque × rpm / constant`, judged by the median relative error.
///
/// A mismatch never fails hard: it yields a warning and hypotheses.
pub(crate) fn cross_signal_check(
    input: CrossSignalInput<'_>,
    config: &CrossSignalConfig,
    hypotheses: &mut Vec<Hypothesis>,
) -> CheckResult {
    const NAME: &str = "Power/torque consistency";
    let bin_ms = (config.bin.as_millis() as u64).max(1);

    let rpm = binned(input.rpm.1, bin_ms);
    let torque = binned(input.torque.1, bin_ms);
    let power = binned(input.power.1, bin_ms);

    let mut direct = Vec::new();
    let mut swapped = Vec::new();
    for (bin, &r) in &rpm {
        if r < config.min_rpm {
            continue;
        }
        let (Some(&t), Some(&p)) = (torque.get(bin), power.get(bin)) else {
            continue;
        };
        let expected_power = t * r / config.constant;
        let expected_torque = p * r / config.constant;
        if expected_power.abs() > f64::EPSILON {
            direct.push((p - expected_power).abs() / expected_power.abs());
        }
        if expected_torque.abs() > f64::EPSILON {
            swapped.push((t - expected_torque).abs() / expected_torque.abs());
        }
    }

    if direct.is_empty() || direct.len() < config.min_bins {
        return CheckResult::pass(
            NAME,
            Stage::Semantic,
            format!(
                "inconclusive: {} aligned samples above {} RPM",
                direct.len(),
                config.min_rpm
            ),
        );
    }

    let error = median(direct);
    if error <= config.tolerance {
        return CheckResult::pass(
            NAME,
            Stage::Semantic,
            format!("power matches torque × rpm / {} (median error {:.1}%)", config.constant, error * 100.0),
        );
    }

    let (rpm_name, torque_name, power_name) = (
        input.rpm.0.name.clone(),
        input.torque.0.name.clone(),
        input.power.0.name.clone(),
    );
    hypotheses.push(Hypothesis {
        kind: HypothesisKind::SuspectedMislabel,
        channels: vec![power_name.clone(), torque_name.clone(), rpm_name],
        message: format!(
            "{power_name} deviates {:.0}% from {torque_name} × RPM / {}; a channel may be mislabeled or in another unit",
            error * 100.0,
            config.constant
        ),
    });
    if !swapped.is_empty() && swapped.len() >= config.min_bins && median(swapped) <= config.tolerance {
        hypotheses.push(Hypothesis {
            kind: HypothesisKind::SwappedChannels,
            channels: vec![power_name.clone(), torque_name.clone()],
            message: format!("{power_name} and {torque_name} appear to be swapped"),
        });
    }

    CheckResult::fail(
        NAME,
        Stage::Semantic,
        CheckSeverity::Warning,
        format!("power inconsistent with torque × rpm (median error {:.1}%)", error * 100.0),
        "verify channel labels and units for power and torque",
    )
}
