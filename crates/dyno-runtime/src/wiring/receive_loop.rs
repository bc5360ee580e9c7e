//! Socket receive loop.
//!
//! Waits only on the socket. Each datagram is classified by its first key
//! byte and pushed onto the ingestion queue; a full queue sheds instead of
//! blocking.

use std::sync::Arc;
use std::time::Duration;

use dl_01_wire_codec::{MessageKey, RawHeader};
use dl_03_provider_discovery::{cancelled, MessageSource};
use dl_07_reliability::{Priority, PushOutcome};
use shared_types::TransportError;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::container::{InboundDatagram, SubsystemContainer};

/// Pause after a failed receive before reading again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Queue priority of a datagram, judged by its first message.
///
/// Registry changes outrank samples; anything unreadable goes last and is
/// counted as malformed by the worker.
pub fn classify(datagram: &[u8]) -> Priority {
    match RawHeader::peek(datagram).and_then(|h| h.message_key()) {
        Some(MessageKey::ChannelInfo | MessageKey::ClearChannelInfo) => Priority::High,
        Some(MessageKey::ChannelValues) => Priority::Normal,
        Some(_) | None => Priority::Low,
    }
}

pub async fn run_receive_loop(
    source: Arc<dyn MessageSource>,
    container: Arc<SubsystemContainer>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Receive loop started");

    loop {
        let received = tokio::select! {
            received = source.recv() => received,
            _ = cancelled(&mut shutdown) => break,
        };

        match received {
            Ok((bytes, source_addr)) => {
                let priority = classify(&bytes);
                let datagram = InboundDatagram {
                    bytes,
                    source: source_addr,
                    received_at: container.time_source.now(),
                };
                match container.queue.push(datagram, priority) {
                    PushOutcome::Enqueued => {}
                    PushOutcome::DroppedIncoming | PushOutcome::Evicted(_) => {
                        container.validator.frames().record_dropped();
                    }
                }
                trace!(source = %source_addr, ?priority, "Datagram queued");
            }
            Err(TransportError::Closed) => {
                info!("Transport closed, receive loop exiting");
                break;
            }
            Err(err) => {
                warn!(error = %err, "Receive failed");
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }

    debug!("Receive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_01_wire_codec::{encode_body, MessageBody};
    use shared_types::ProviderId;

    fn datagram(body: MessageBody) -> Vec<u8> {
        encode_body(&body, ProviderId(1), 0, ProviderId::BROADCAST).unwrap()
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(&datagram(MessageBody::Clear)), Priority::High);
        assert_eq!(classify(&datagram(MessageBody::Values(Vec::new()))), Priority::Normal);
        assert_eq!(classify(&datagram(MessageBody::Ping)), Priority::Low);
        assert_eq!(classify(&[0x02, 0x00]), Priority::Low);
        assert_eq!(classify(&[0x7F, 0, 0, 1, 0, 0, 0xFF, 0xFF]), Priority::Low);
    }
}
