//! Pure evaluation of the five stages.

use chrono::{DateTime, Utc};
use dl_05_channel_validator::{ChannelHealth, FrameStatsSnapshot};
use shared_types::{ChannelInfo, ChannelKey, Provider, ProviderId, Timestamp};

use crate::config::PreflightConfig;
use crate::result::{CheckResult, CheckSeverity, Hypothesis, PreflightMode, PreflightResult, Stage};
use crate::semantic::{cross_signal_check, signal_checks, CrossSignalInput, SampleWindow};
use crate::signals::SignalSpec;

/// Everything one evaluation looks at.
#[derive(Debug, Clone)]
pub struct PreflightInput<'a> {
    /// Provider id the caller asked for, if any.
    pub requested: Option<ProviderId>,
    /// The selected provider as currently registered.
    pub provider: Option<&'a Provider>,
    pub now: Timestamp,
    /// Health of the provider's channels after the passive window.
    pub channel_health: &'a [ChannelHealth],
    pub frames: FrameStatsSnapshot,
    pub samples: &'a SampleWindow,
    pub mode: PreflightMode,
    pub incomplete: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Pick the provider to check.
///
/// An explicit request wins. Otherwise a lone provider is chosen; among
/// several, the lowest id declaring every required signal, else the lowest
/// id.
pub fn select_provider<'a>(
    requested: Option<ProviderId>,
    providers: &'a [Provider],
    config: &PreflightConfig,
) -> Option<&'a Provider> {
    if let Some(id) = requested {
        return providers.iter().find(|p| p.id == id);
    }

    let mut sorted: Vec<&Provider> = providers.iter().collect();
    sorted.sort_by_key(|p| p.id);

    sorted
        .iter()
        .find(|p| config.required.iter().all(|spec| !spec.find(p).is_empty()))
        .or_else(|| sorted.first())
        .copied()
}

pub fn evaluate(input: &PreflightInput<'_>, config: &PreflightConfig) -> PreflightResult {
    let mut checks = Vec::new();
    let mut missing_channels = Vec::new();
    let mut recommended_missing = Vec::new();
    let mut hypotheses = Vec::new();

    if let Some(provider) = input.provider {
        checks.push(CheckResult::pass(
            "Provider discovered",
            Stage::Connectivity,
            format!("{} ({}) with {} channels", provider.name, provider.id, provider.channels.len()),
        ));

        let silent_for = input.now.saturating_duration_since(provider.last_seen);
        let timeout_ms = config.discovery_timeout.as_millis();
        checks.push(if silent_for < config.discovery_timeout {
            CheckResult::pass(
                "Provider responsive",
                Stage::Connectivity,
                format!("heard within {timeout_ms}ms"),
            )
        } else {
            CheckResult::fail(
                "Provider responsive",
                Stage::Connectivity,
                CheckSeverity::Error,
                format!("silent for over {timeout_ms}ms"),
                "check the dyno is running and still on the network",
            )
        }
        .with_measured(silent_for.as_millis() as f64));

        // Stage 2
        let mut required: Vec<(&str, Vec<&ChannelInfo>)> = Vec::new();
        for spec in &config.required {
            let found = spec.find(provider);
            let name = format!("{} channel", spec.label);
            if found.is_empty() {
                missing_channels.push(spec.label.clone());
                checks.push(CheckResult::fail(
                    name,
                    Stage::RequiredChannels,
                    CheckSeverity::Error,
                    format!("no {} channel declared", spec.label),
                    format!("enable a {} channel in the dyno's broadcast configuration", spec.label),
                ));
            } else {
                let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
                checks.push(CheckResult::pass(
                    name,
                    Stage::RequiredChannels,
                    format!("found {}", names.join(", ")),
                ));
            }
            required.push((spec.label.as_str(), found));
        }

        // Stage 3
        for spec in &config.recommended {
            let found = spec.find(provider);
            let name = format!("{} channel", spec.label);
            checks.push(match found.first() {
                Some(channel) => CheckResult::pass(
                    name,
                    Stage::RecommendedChannels,
                    format!("found {}", channel.name),
                ),
                None => {
                    recommended_missing.push(spec.label.clone());
                    CheckResult::fail(
                        name,
                        Stage::RecommendedChannels,
                        CheckSeverity::Warning,
                        format!("no {} channel declared", spec.label),
                        format!("add a {} channel for richer diagnostics", spec.label),
                    )
                }
            });
        }

        // Stage 4
        for (label, channels) in &required {
            for channel in channels {
                let key = ChannelKey::new(provider.id, channel.id);
                let health = input.channel_health.iter().find(|h| h.key == key);
                checks.extend(health_checks(label, channel, health, config));
            }
        }
        let drop_ratio = input.frames.drop_ratio();
        let drop_limit = config.max_drop_ratio * 100.0;
        checks.push(if drop_ratio < config.max_drop_ratio {
            CheckResult::pass(
                "Frame drop rate",
                Stage::HealthThresholds,
                format!("frame loss under {drop_limit:.0}%"),
            )
        } else {
            CheckResult::fail(
                "Frame drop rate",
                Stage::HealthThresholds,
                CheckSeverity::Warning,
                format!("frame loss at or above {drop_limit:.0}%"),
                "reduce network load or move off shared Wi-Fi",
            )
        }
        .with_measured(drop_ratio));

        // Stage 5
        for (label, channels) in &required {
            let Some(spec) = config.required_spec(label) else {
                continue;
            };
            for channel in channels {
                let values = input.samples.get(ChannelKey::new(provider.id, channel.id));
                checks.extend(signal_checks(spec, channel, values, &mut hypotheses));
            }
        }
        if let Some(check) = cross_signal(provider, input.samples, config, &mut hypotheses) {
            checks.push(check);
        }
    } else {
        let message = match input.requested {
            Some(id) => format!("provider {id} not discovered"),
            None => "no providers discovered".to_string(),
        };
        checks.push(CheckResult::fail(
            "Provider discovered",
            Stage::Connectivity,
            CheckSeverity::Error,
            message,
            "check the dyno is powered, broadcasting, and on the same network and multicast group",
        ));
    }

    let passed = checks
        .iter()
        .filter(|c| c.stage.gates_verdict())
        .all(|c| c.passed);

    PreflightResult {
        passed,
        provider_id: input.provider.map(|p| p.id),
        provider_name: input.provider.map(|p| p.name.clone()),
        mode: input.mode,
        checks,
        missing_channels,
        recommended_missing,
        hypotheses,
        can_override: !passed && input.mode == PreflightMode::Advisory,
        incomplete: input.incomplete,
        evaluated_at: input.evaluated_at,
        override_record: None,
    }
}

fn health_checks(
    label: &str,
    channel: &ChannelInfo,
    health: Option<&ChannelHealth>,
    config: &PreflightConfig,
) -> Vec<CheckResult> {
    let freshness = format!("{label} freshness");
    let rate = format!("{label} rate");

    let Some(health) = health else {
        let message = format!("{} has produced no samples", channel.name);
        let hint = "confirm the channel is streaming";
        return vec![
            CheckResult::fail(freshness, Stage::HealthThresholds, CheckSeverity::Warning, &message, hint),
            CheckResult::fail(rate, Stage::HealthThresholds, CheckSeverity::Warning, &message, hint),
        ];
    };

    let max_age_ms = config.max_sample_age.as_millis() as u64;
    let fresh = match health.age_ms {
        Some(age) if age < max_age_ms => CheckResult::pass(
            &freshness,
            Stage::HealthThresholds,
            format!("{} sampled within {max_age_ms}ms", channel.name),
        )
        .with_measured(age as f64),
        Some(age) => CheckResult::fail(
            &freshness,
            Stage::HealthThresholds,
            CheckSeverity::Warning,
            format!("{} silent for over {max_age_ms}ms", channel.name),
            "check the sensor and the dyno's broadcast rate",
        )
        .with_measured(age as f64),
        None => CheckResult::fail(
            &freshness,
            Stage::HealthThresholds,
            CheckSeverity::Warning,
            format!("{} has produced no samples", channel.name),
            "confirm the channel is streaming",
        ),
    };

    let streaming = if health.rate_hz > config.min_rate_hz {
        CheckResult::pass(
            &rate,
            Stage::HealthThresholds,
            format!("{} above {:.1}/s", channel.name, config.min_rate_hz),
        )
    } else {
        CheckResult::fail(
            &rate,
            Stage::HealthThresholds,
            CheckSeverity::Warning,
            format!("{} at or below {:.1}/s", channel.name, config.min_rate_hz),
            "raise the broadcast rate for this channel",
        )
    }
    .with_measured(health.rate_hz);

    vec![fresh, streaming]
}

/// Cross-signal check when RPM, Torque and Power are all declared.
fn cross_signal(
    provider: &Provider,
    samples: &SampleWindow,
    config: &PreflightConfig,
    hypotheses: &mut Vec<Hypothesis>,
) -> Option<CheckResult> {
    let first = |spec: Option<&SignalSpec>| {
        spec.and_then(|s| s.find(provider).first().copied())
    };
    let rpm = first(config.required_spec("RPM"))?;
    let torque = first(config.recommended_spec("Torque"))?;
    let power = first(config.recommended_spec("Power"))?;

    let key = |channel: &ChannelInfo| ChannelKey::new(provider.id, channel.id);
    Some(cross_signal_check(
        CrossSignalInput {
            rpm: (rpm, samples.get(key(rpm))),
            torque: (torque, samples.get(key(torque))),
            power: (power, samples.get(key(power))),
        },
        &config.cross_signal,
        hypotheses,
    ))
}
