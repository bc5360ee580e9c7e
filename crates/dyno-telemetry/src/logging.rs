//! Structured logging.
//!
//! Logs carry consistent fields so they can be parsed by a log shipper:
//! - `timestamp`, `level`, `target`
//! - `subsystem`: wire-codec, discovery, validator, preflight, reliability
//! - `provider_id` / `channel` where a provider or channel is involved

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global `tracing` subscriber described by `config`.
///
/// `RUST_LOG` style directives are accepted in `log_level`.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Filter(e.to_string()))?;

    if !config.console_output {
        return tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()));
    }

    if config.json_logs {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_ids(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
    }
}

/// Helper to create structured log entries with consistent formatting.
#[macro_export]
macro_rules! log_event {
    (info, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    (error, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a provider-related event with standard fields.
#[macro_export]
macro_rules! log_provider_event {
    ($level:ident, $subsystem:expr, $msg:expr, $provider_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            provider_id = %$provider_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a channel-related event with standard fields.
#[macro_export]
macro_rules! log_channel_event {
    ($level:ident, $subsystem:expr, $msg:expr, $channel_key:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            channel = %$channel_key,
            $($($field)*,)?
            $msg
        )
    };
}
