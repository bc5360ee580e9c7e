//! Message header and key enumeration.
//!
//! ```text
//! offset  size  field
//! 0       1     key
//! 1       2     payload length (LE)
//! 3       2     sender id (LE)
//! 5       1     sequence number
//! 6       2     destination id (LE)
//! 8       n     payload
//! ```

use serde::{Deserialize, Serialize};
use shared_types::ProviderId;
use std::fmt;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest payload a header can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Message type carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKey {
    /// Provider name followed by channel descriptors.
    ChannelInfo = 0x01,
    /// Repeated (channel, counter, value) records.
    ChannelValues = 0x02,
    /// The sender withdraws every channel it announced.
    ClearChannelInfo = 0x03,
    Ping = 0x04,
    Pong = 0x05,
    /// Ask one provider (or all) to re-announce.
    RequestChannelInfo = 0x06,
}

impl MessageKey {
    /// Decode a key byte. `None` for bytes outside the protocol.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ChannelInfo),
            0x02 => Some(Self::ChannelValues),
            0x03 => Some(Self::ClearChannelInfo),
            0x04 => Some(Self::Ping),
            0x05 => Some(Self::Pong),
            0x06 => Some(Self::RequestChannelInfo),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelInfo => write!(f, "channel-info"),
            Self::ChannelValues => write!(f, "channel-values"),
            Self::ClearChannelInfo => write!(f, "clear-channel-info"),
            Self::Ping => write!(f, "ping"),
            Self::Pong => write!(f, "pong"),
            Self::RequestChannelInfo => write!(f, "request-channel-info"),
        }
    }
}

/// Decoded header of a known message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub key: MessageKey,
    pub payload_len: u16,
    pub sender: ProviderId,
    pub sequence: u8,
    pub destination: ProviderId,
}

impl MessageHeader {
    /// Whether a node with id `local` should process this message.
    ///
    /// Broadcast messages are for everyone; with no local id assigned only
    /// broadcasts are considered addressed to us.
    pub fn is_addressed_to(&self, local: Option<ProviderId>) -> bool {
        self.destination.is_broadcast() || local == Some(self.destination)
    }

    /// Total encoded size of the message this header describes.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }
}

/// Header fields read without interpreting the key.
///
/// The receive loop uses this to prioritise frames before the worker pays
/// for a full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub key: u8,
    pub payload_len: u16,
    pub sender: u16,
    pub sequence: u8,
    pub destination: u16,
}

impl RawHeader {
    /// Read the header at the start of `buf`, `None` if fewer than
    /// [`HEADER_LEN`] bytes are available.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            key: buf[0],
            payload_len: u16::from_le_bytes([buf[1], buf[2]]),
            sender: u16::from_le_bytes([buf[3], buf[4]]),
            sequence: buf[5],
            destination: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }

    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }

    pub fn message_key(&self) -> Option<MessageKey> {
        MessageKey::from_byte(self.key)
    }
}
