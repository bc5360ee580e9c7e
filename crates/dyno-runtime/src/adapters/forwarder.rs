//! Outbound port for validated samples.
//!
//! Every call goes through the `sample-forwarder` breaker, so a stalled
//! collaborator degrades to dropped batches instead of stalling the workers.

use async_trait::async_trait;
use shared_types::Sample;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("forwarder closed")]
    Closed,

    #[error("forwarder is full")]
    Full,

    #[error("forwarder failed: {0}")]
    Failed(String),
}

/// Receives the in-scope samples of one values frame.
#[async_trait]
pub trait SampleForwarder: Send + Sync {
    async fn forward(&self, batch: &[Sample]) -> Result<(), ForwardError>;
}

/// Hands batches to a bounded channel without waiting.
pub struct ChannelForwarder {
    tx: mpsc::Sender<Vec<Sample>>,
}

impl ChannelForwarder {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<Sample>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SampleForwarder for ChannelForwarder {
    async fn forward(&self, batch: &[Sample]) -> Result<(), ForwardError> {
        self.tx.try_send(batch.to_vec()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ForwardError::Full,
            mpsc::error::TrySendError::Closed(_) => ForwardError::Closed,
        })
    }
}
