//! Discovery errors.

use dl_01_wire_codec::EncodeError;
use shared_types::{ProviderId, TransportError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("provider {0} not found")]
    NotFound(ProviderId),

    #[error("provider {provider} did not re-announce within {waited_ms}ms")]
    Timeout { provider: ProviderId, waited_ms: u64 },

    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("0x{0:04X} cannot be used as a node id")]
    InvalidNodeId(u16),

    #[error("every node id is already in use")]
    NodeIdSpaceExhausted,
}
