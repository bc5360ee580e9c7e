//! Codec errors.
//!
//! A [`FrameError`] always concerns one message. Callers count it and move
//! on; nothing here is fatal to the receive path.

use thiserror::Error;

/// A single message could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than the header, or than header plus declared payload.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Key byte outside the protocol. `frame_len` still allows skipping to
    /// the next message in the datagram.
    #[error("unknown message key 0x{key:02X}")]
    UnknownKey { key: u8, frame_len: usize },

    /// The payload is shorter than the fixed part its key requires.
    #[error("{key:#04x} payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort {
        key: u8,
        expected: usize,
        actual: usize,
    },
}

impl FrameError {
    /// Bytes to skip to reach the next message, when the frame boundary is
    /// still known.
    pub fn skip_len(&self) -> Option<usize> {
        match self {
            Self::Truncated { .. } => None,
            Self::UnknownKey { frame_len, .. } => Some(*frame_len),
            Self::PayloadTooShort { actual, .. } => Some(crate::HEADER_LEN + *actual),
        }
    }
}

/// A message could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}
