use shared_types::ProviderId;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("session {session_id} already pinned to provider {provider}")]
    AlreadyPinned {
        provider: ProviderId,
        session_id: Uuid,
    },

    #[error("cannot pin the broadcast id")]
    BroadcastProvider,

    #[error("no active session")]
    NotPinned,
}
