//! # Wire Codec Subsystem
//!
//! **Subsystem ID:** 1
//!
//! Encodes and decodes the fixed-format binary messages dynamometer
//! controllers broadcast over UDP multicast.
//!
//! ## Guarantees
//!
//! - Little-endian, bit-exact header: `key | len | sender | seq | dest`.
//! - Encoding is deterministic and its length is always header plus payload.
//! - A malformed message is an error value for that message only. A
//!   truncated descriptor or record tail is reported, never fatal.
//!
//! ## Example
//!
//! ```rust
//! use dl_01_wire_codec::{decode_frame, encode_body, MessageBody, ValueRecord};
//! use shared_types::{ChannelId, ProviderId};
//!
//! let body = MessageBody::Values(vec![ValueRecord {
//!     channel: ChannelId(1),
//!     counter: 1_500,
//!     value: 3200.0,
//! }]);
//! let bytes = encode_body(&body, ProviderId(7), 1, ProviderId::BROADCAST).unwrap();
//!
//! let (frame, consumed) = decode_frame(&bytes).unwrap();
//! assert_eq!(consumed, bytes.len());
//! assert_eq!(frame.body, body);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod codec;
pub mod domain;

pub use codec::{decode_frame, encode_body, encode_message, frames, DatagramFrames, Frame, MessageBody};
pub use domain::{
    Announcement, Decoded, EncodeError, FrameError, MessageHeader, MessageKey, RawHeader,
    ValueRecord, CHANNEL_NAME_LEN, DESCRIPTOR_LEN, HEADER_LEN, MAX_PAYLOAD_LEN, PROVIDER_NAME_LEN,
    VALUE_RECORD_LEN,
};
