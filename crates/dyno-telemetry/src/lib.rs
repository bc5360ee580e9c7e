//! # Dyno Telemetry
//!
//! Structured logging for the DynoLink pipeline.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dyno_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//!     // Logs are now emitted as plain text or JSON depending on config.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DL_SERVICE_NAME` | `dynolink` | Service name attached to the startup log |
//! | `DL_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `DL_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |
//! | `DL_CONSOLE_OUTPUT` | `true` | Emit logs to stdout at all |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Initialize structured logging.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    init_logging(config)?;
    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        level = %config.log_level,
        "Telemetry initialised"
    );
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for creating a span with subsystem context.
///
/// ```rust,ignore
/// let _span = dyno_telemetry::subsystem_span!("decode", subsystem = "wire-codec").entered();
/// ```
#[macro_export]
macro_rules! subsystem_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
