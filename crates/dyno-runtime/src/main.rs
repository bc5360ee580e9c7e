//! # DynoLink Runtime Binary
//!
//! ```text
//! dyno-runtime [config.toml]
//! ```
//!
//! Loads configuration, binds the multicast group, discovers providers,
//! optionally runs preflight and a capture session, then logs pipeline
//! health until Ctrl-C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use dyno_runtime::{DynoRuntime, RuntimeConfig};
use dyno_telemetry::{init_telemetry, log_event, TelemetryConfig};
use shared_types::ProviderId;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let _guard = init_telemetry(&telemetry).context("Failed to initialize logging")?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config =
        RuntimeConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    info!("===========================================");
    info!("  DynoLink Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let multicast = config.multicast();
    let runtime = DynoRuntime::bind_udp(config.clone())
        .await
        .with_context(|| format!("Failed to bind multicast group {}", multicast.group_addr()))?;
    runtime.start().context("Failed to start pipeline")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!(error = %err, "Failed to listen for Ctrl-C"),
        }
        let _ = stop_tx.send(true);
    });

    let discovered = runtime.discover(stop_rx.clone()).await;
    for provider in &discovered.providers {
        info!(
            provider_id = %provider.id,
            name = %provider.name,
            channels = provider.channels.len(),
            address = %provider.address,
            "Provider available"
        );
    }
    if discovered.providers.is_empty() {
        warn!("No providers discovered yet");
    }

    if config.runtime.auto_preflight && !*stop_rx.borrow() && !discovered.providers.is_empty() {
        run_preflight_and_capture(&runtime, &config, stop_rx.clone()).await;
    }

    log_health_until_stopped(&runtime, &config, stop_rx).await;

    if runtime.active_session().is_some() {
        match runtime.stop_session() {
            Ok(summary) => info!(
                session_id = %summary.session_id,
                channels = summary.channels.len(),
                "Capture summary ready"
            ),
            Err(err) => warn!(error = %err, "Failed to stop session"),
        }
    }
    runtime.shutdown().await;
    info!("DynoLink runtime stopped");
    Ok(())
}

async fn run_preflight_and_capture(
    runtime: &DynoRuntime,
    config: &RuntimeConfig,
    stop: watch::Receiver<bool>,
) {
    let requested = config.runtime.provider.map(ProviderId);
    let result = runtime
        .run_preflight(requested, config.runtime.preflight_mode, None, stop)
        .await;

    match serde_json::to_string(&result) {
        Ok(json) => log_event!(info, "preflight", "Preflight result", passed = result.passed, result = %json),
        Err(err) => warn!(error = %err, "Failed to serialize preflight result"),
    }
    for check in result.failed_checks() {
        warn!(
            check = %check.name,
            stage = %check.stage,
            message = %check.message,
            fix = check.fix_hint.as_deref().unwrap_or(""),
            "Preflight check failed"
        );
    }

    if !config.runtime.auto_start_session || !result.permits_capture() {
        return;
    }
    let Some(provider) = result.provider_id else {
        return;
    };
    if let Err(err) = runtime.start_session(provider, Some(&result)) {
        warn!(provider_id = %provider, error = %err, "Session not started");
    }
}

async fn log_health_until_stopped(
    runtime: &DynoRuntime,
    config: &RuntimeConfig,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.health_log_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let pipeline = runtime.channel_health();
                let reliability = runtime.reliability_health();
                info!(
                    status = %pipeline.status,
                    channels = pipeline.channels.len(),
                    frames = pipeline.frames.total,
                    drop_ratio = pipeline.drop_ratio,
                    reliability = ?reliability.status,
                    queue_size = reliability.queue.as_ref().map_or(0, |q| q.current_size),
                    "Pipeline health"
                );
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}
