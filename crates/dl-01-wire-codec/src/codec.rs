//! Frame encoding and decoding.

use shared_types::ProviderId;
use tracing::trace;

use crate::domain::{
    decode_announcement, decode_values, encode_announcement, encode_values, Announcement,
    EncodeError, FrameError, MessageHeader, MessageKey, RawHeader, ValueRecord, HEADER_LEN,
    MAX_PAYLOAD_LEN,
};

/// Interpreted message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Announcement(Announcement),
    Values(Vec<ValueRecord>),
    /// The header's sender id names the provider being cleared.
    Clear,
    Ping,
    Pong,
    RequestChannelInfo,
}

impl MessageBody {
    pub fn key(&self) -> MessageKey {
        match self {
            Self::Announcement(_) => MessageKey::ChannelInfo,
            Self::Values(_) => MessageKey::ChannelValues,
            Self::Clear => MessageKey::ClearChannelInfo,
            Self::Ping => MessageKey::Ping,
            Self::Pong => MessageKey::Pong,
            Self::RequestChannelInfo => MessageKey::RequestChannelInfo,
        }
    }

    fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::Announcement(announcement) => encode_announcement(announcement),
            Self::Values(records) => encode_values(records),
            Self::Clear | Self::Ping | Self::Pong | Self::RequestChannelInfo => Vec::new(),
        }
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: MessageHeader,
    pub body: MessageBody,
    /// Trailing payload bytes that did not form a whole descriptor/record.
    pub ignored_bytes: usize,
}

/// Encode a message from its header fields and raw payload.
///
/// The output length is always `HEADER_LEN + payload.len()`.
pub fn encode_message(
    key: MessageKey,
    sender: ProviderId,
    sequence: u8,
    destination: ProviderId,
    payload: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(key.as_byte());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&sender.value().to_le_bytes());
    out.push(sequence);
    out.extend_from_slice(&destination.value().to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode an interpreted message body.
pub fn encode_body(
    body: &MessageBody,
    sender: ProviderId,
    sequence: u8,
    destination: ProviderId,
) -> Result<Vec<u8>, EncodeError> {
    encode_message(body.key(), sender, sequence, destination, &body.encode_payload())
}

/// Decode the message at the start of `buf`.
///
/// Returns the frame and the number of bytes it occupied.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
    let raw = RawHeader::peek(buf).ok_or(FrameError::Truncated {
        needed: HEADER_LEN,
        available: buf.len(),
    })?;

    let frame_len = raw.frame_len();
    if buf.len() < frame_len {
        return Err(FrameError::Truncated {
            needed: frame_len,
            available: buf.len(),
        });
    }

    let key = raw.message_key().ok_or(FrameError::UnknownKey {
        key: raw.key,
        frame_len,
    })?;

    let header = MessageHeader {
        key,
        payload_len: raw.payload_len,
        sender: ProviderId(raw.sender),
        sequence: raw.sequence,
        destination: ProviderId(raw.destination),
    };
    let payload = &buf[HEADER_LEN..frame_len];

    let (body, ignored_bytes) = match key {
        MessageKey::ChannelInfo => {
            let decoded = decode_announcement(payload)?;
            (MessageBody::Announcement(decoded.value), decoded.ignored_bytes)
        }
        MessageKey::ChannelValues => {
            let decoded = decode_values(payload);
            (MessageBody::Values(decoded.value), decoded.ignored_bytes)
        }
        MessageKey::ClearChannelInfo => (MessageBody::Clear, payload.len()),
        MessageKey::Ping => (MessageBody::Ping, payload.len()),
        MessageKey::Pong => (MessageBody::Pong, payload.len()),
        MessageKey::RequestChannelInfo => (MessageBody::RequestChannelInfo, payload.len()),
    };

    if ignored_bytes > 0 {
        trace!(%key, sender = %header.sender, ignored_bytes, "Ignored trailing payload bytes");
    }

    Ok((
        Frame {
            header,
            body,
            ignored_bytes,
        },
        frame_len,
    ))
}

/// Iterate the messages packed into one datagram.
///
/// Yields one result per message. Errors that still know the frame boundary
/// are yielded and skipped over; a truncation error is yielded last because
/// the next header position is unknowable.
pub fn frames(datagram: &[u8]) -> DatagramFrames<'_> {
    DatagramFrames {
        remaining: datagram,
        done: false,
    }
}

pub struct DatagramFrames<'a> {
    remaining: &'a [u8],
    done: bool,
}

impl Iterator for DatagramFrames<'_> {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining.is_empty() {
            return None;
        }

        match decode_frame(self.remaining) {
            Ok((frame, consumed)) => {
                self.remaining = &self.remaining[consumed..];
                Some(Ok(frame))
            }
            Err(err) => {
                match err.skip_len() {
                    Some(skip) => self.remaining = &self.remaining[skip..],
                    None => self.done = true,
                }
                Some(Err(err))
            }
        }
    }
}
