//! Payload layouts.
//!
//! Announcement: a 50-byte NUL-padded provider name followed by 34-byte
//! channel descriptors.
//!
//! ```text
//! descriptor: id u16 | vendor u8 | name [u8; 30] | unit u8
//! record:     id u16 | counter u32 (ms) | value f32
//! ```
//!
//! Both lists tolerate a truncated tail: whole entries are parsed, the
//! leftover bytes are reported and the message is kept.

use serde::{Deserialize, Serialize};
use shared_types::{ChannelId, ChannelInfo, Unit};

use super::errors::FrameError;
use super::header::MessageKey;

pub const PROVIDER_NAME_LEN: usize = 50;
pub const CHANNEL_NAME_LEN: usize = 30;
pub const DESCRIPTOR_LEN: usize = 34;
pub const VALUE_RECORD_LEN: usize = 10;

/// A provider's full self-description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub name: String,
    pub channels: Vec<ChannelInfo>,
}

/// One raw value as it travels on the wire, before clock reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub channel: ChannelId,
    /// Sender-relative millisecond counter.
    pub counter: u32,
    pub value: f32,
}

/// A decoded payload plus the number of trailing bytes that did not form a
/// whole entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub ignored_bytes: usize,
}

impl<T> Decoded<T> {
    pub fn is_truncated(&self) -> bool {
        self.ignored_bytes > 0
    }
}

/// Write `text` into a zeroed field of `width` bytes, cutting on a character
/// boundary so the field stays valid UTF-8.
pub fn write_fixed_str(out: &mut Vec<u8>, text: &str, width: usize) {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    out.extend_from_slice(&text.as_bytes()[..end]);
    out.resize(out.len() + (width - end), 0);
}

/// Read a NUL-terminated (or full-width) string field.
pub fn read_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

pub fn encode_announcement(announcement: &Announcement) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(PROVIDER_NAME_LEN + announcement.channels.len() * DESCRIPTOR_LEN);
    write_fixed_str(&mut out, &announcement.name, PROVIDER_NAME_LEN);
    for channel in &announcement.channels {
        out.extend_from_slice(&channel.id.value().to_le_bytes());
        out.push(channel.vendor);
        write_fixed_str(&mut out, &channel.name, CHANNEL_NAME_LEN);
        out.push(channel.unit.code());
    }
    out
}

pub fn decode_announcement(payload: &[u8]) -> Result<Decoded<Announcement>, FrameError> {
    if payload.len() < PROVIDER_NAME_LEN {
        return Err(FrameError::PayloadTooShort {
            key: MessageKey::ChannelInfo.as_byte(),
            expected: PROVIDER_NAME_LEN,
            actual: payload.len(),
        });
    }

    let name = read_fixed_str(&payload[..PROVIDER_NAME_LEN]);
    let body = &payload[PROVIDER_NAME_LEN..];
    let descriptors = body.chunks_exact(DESCRIPTOR_LEN);
    let ignored_bytes = descriptors.remainder().len();

    let channels = descriptors
        .map(|d| ChannelInfo {
            id: ChannelId(u16::from_le_bytes([d[0], d[1]])),
            vendor: d[2],
            name: read_fixed_str(&d[3..3 + CHANNEL_NAME_LEN]),
            unit: Unit::from_code(d[3 + CHANNEL_NAME_LEN]),
        })
        .collect();

    Ok(Decoded {
        value: Announcement { name, channels },
        ignored_bytes,
    })
}

pub fn encode_values(records: &[ValueRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * VALUE_RECORD_LEN);
    for record in records {
        out.extend_from_slice(&record.channel.value().to_le_bytes());
        out.extend_from_slice(&record.counter.to_le_bytes());
        out.extend_from_slice(&record.value.to_le_bytes());
    }
    out
}

pub fn decode_values(payload: &[u8]) -> Decoded<Vec<ValueRecord>> {
    let records = payload.chunks_exact(VALUE_RECORD_LEN);
    let ignored_bytes = records.remainder().len();

    let value = records
        .map(|r| ValueRecord {
            channel: ChannelId(u16::from_le_bytes([r[0], r[1]])),
            counter: u32::from_le_bytes([r[2], r[3], r[4], r[5]]),
            value: f32::from_le_bytes([r[6], r[7], r[8], r[9]]),
        })
        .collect();

    Decoded {
        value,
        ignored_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_str_pads_with_nul() {
        let mut out = Vec::new();
        write_fixed_str(&mut out, "RPM", 6);
        assert_eq!(out, b"RPM\0\0\0");
        assert_eq!(read_fixed_str(&out), "RPM");
    }

    #[test]
    fn test_fixed_str_truncates_on_char_boundary() {
        // "é" is two bytes; a 4-byte field cannot hold "abcé" whole.
        let mut out = Vec::new();
        write_fixed_str(&mut out, "abcé", 4);
        assert_eq!(out, b"abc\0");
    }

    #[test]
    fn test_read_fixed_str_without_terminator() {
        assert_eq!(read_fixed_str(b"Torque"), "Torque");
    }

    #[test]
    fn test_read_fixed_str_lossy() {
        assert_eq!(read_fixed_str(&[b'A', 0xFF, b'B', 0]), "A\u{FFFD}B");
    }

    #[test]
    fn test_announcement_layout() {
        let announcement = Announcement {
            name: "Dyno".into(),
            channels: vec![ChannelInfo {
                id: ChannelId(0x0102),
                name: "RPM".into(),
                unit: Unit::EngineSpeed,
                vendor: 9,
            }],
        };
        let payload = encode_announcement(&announcement);
        assert_eq!(payload.len(), PROVIDER_NAME_LEN + DESCRIPTOR_LEN);
        assert_eq!(&payload[50..53], &[0x02, 0x01, 9]);
        assert_eq!(payload[PROVIDER_NAME_LEN + DESCRIPTOR_LEN - 1], 8);

        let decoded = decode_announcement(&payload).unwrap();
        assert_eq!(decoded.value, announcement);
        assert!(!decoded.is_truncated());
    }

    #[test]
    fn test_announcement_truncated_descriptor_is_reported() {
        let announcement = Announcement {
            name: "Dyno".into(),
            channels: vec![
                ChannelInfo::new(ChannelId(1), "RPM", Unit::EngineSpeed),
                ChannelInfo::new(ChannelId(2), "AFR", Unit::Afr),
            ],
        };
        let mut payload = encode_announcement(&announcement);
        payload.truncate(payload.len() - 5);

        let decoded = decode_announcement(&payload).unwrap();
        assert_eq!(decoded.value.channels.len(), 1);
        assert_eq!(decoded.value.channels[0].name, "RPM");
        assert_eq!(decoded.ignored_bytes, DESCRIPTOR_LEN - 5);
    }

    #[test]
    fn test_announcement_without_name_is_rejected() {
        let err = decode_announcement(&[0u8; 12]).unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadTooShort {
                key: 0x01,
                expected: PROVIDER_NAME_LEN,
                actual: 12
            }
        );
    }

    #[test]
    fn test_values_truncated_record_is_ignored() {
        let records = [
            ValueRecord {
                channel: ChannelId(1),
                counter: 1_000,
                value: 3000.0,
            },
            ValueRecord {
                channel: ChannelId(2),
                counter: 1_000,
                value: 14.7,
            },
        ];
        let mut payload = encode_values(&records);
        payload.truncate(VALUE_RECORD_LEN + 4);

        let decoded = decode_values(&payload);
        assert_eq!(decoded.value, vec![records[0]]);
        assert_eq!(decoded.ignored_bytes, 4);
    }
}
