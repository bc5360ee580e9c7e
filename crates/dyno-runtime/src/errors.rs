use dl_03_provider_discovery::DiscoveryError;
use dl_04_session_pinning::PinError;
use shared_types::{ProviderId, TransportError};
use thiserror::Error;

use crate::container::ConfigError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error("provider {0} is not in the registry")]
    UnknownProvider(ProviderId),

    #[error("a passing or overridden preflight is required to start a session")]
    PreflightRequired,

    #[error("preflight failed: {failed}")]
    PreflightFailed { failed: String },

    #[error("preflight was run against {checked:?}, not provider {requested}")]
    PreflightMismatch {
        requested: ProviderId,
        checked: Option<ProviderId>,
    },

    #[error("runtime already started")]
    AlreadyStarted,
}
