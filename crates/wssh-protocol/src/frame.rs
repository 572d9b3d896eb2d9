//! Frame encoding/decoding
//!
//! Every WebSocket message carries exactly one frame:
//! - tag: 1 byte (u8), the message type
//! - payload: the remaining bytes of the message
//!
//! There is no length field; the WebSocket message boundary delimits the
//! frame. A message with no bytes at all is not a frame.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Size of the frame tag in bytes
pub const TAG_SIZE: usize = 1;

/// Message type identifier (the tag byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Explicitly untyped frame
    Unknown = 0x00,
    /// Reserved for session configuration, no handler yet
    Config = 0x01,
    /// Terminal data (stdin from the client, stdout/stderr to the client)
    SessionData = 0x02,
    /// Terminal resize request with a JSON payload
    Resize = 0x03,
    /// Keep-alive ping/pong
    Heartbeat = 0x04,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Unknown),
            0x01 => Some(Self::Config),
            0x02 => Some(Self::SessionData),
            0x03 => Some(Self::Resize),
            0x04 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// A decoded frame borrowing its payload from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Type of message in the payload
    pub message_type: MessageType,
    /// Payload bytes (everything after the tag)
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Create a new frame
    pub fn new(message_type: MessageType, payload: &'a [u8]) -> Self {
        Self {
            message_type,
            payload,
        }
    }

    /// Length of the frame on the wire
    pub fn encoded_len(&self) -> usize {
        TAG_SIZE + self.payload.len()
    }

    /// Encode the frame into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u8(self.message_type.as_u8());
        dst.extend_from_slice(self.payload);
    }

    /// Decode a frame from one complete WebSocket message
    ///
    /// Returns Err for an empty message or an undefined tag.
    pub fn decode(src: &'a [u8]) -> Result<Self, ProtocolError> {
        let (&tag, payload) = src.split_first().ok_or(ProtocolError::EmptyFrame)?;
        let message_type =
            MessageType::from_u8(tag).ok_or(ProtocolError::UnknownMessageType(tag))?;

        Ok(Self {
            message_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(MessageType::SessionData, b"ls -la\n");

        let mut buf = BytesMut::new();
        frame.encode(&mut buf);

        assert_eq!(buf.len(), 1 + 7);
        assert_eq!(buf[0], 0x02);

        let decoded = Frame::decode(&buf).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_binary_payload_survives() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let mut buf = BytesMut::new();
        Frame::new(MessageType::SessionData, &payload).encode(&mut buf);

        let decoded = Frame::decode(&buf).unwrap();
        assert_eq!(decoded.message_type, MessageType::SessionData);
        assert_eq!(decoded.payload, &payload[..]);
    }

    #[test]
    fn test_tag_only_frame_has_empty_payload() {
        let decoded = Frame::decode(&[0x04]).unwrap();
        assert_eq!(decoded.message_type, MessageType::Heartbeat);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(matches!(Frame::decode(&[]), Err(ProtocolError::EmptyFrame)));
    }

    #[test]
    fn test_unknown_message_type() {
        let result = Frame::decode(&[99, b'x']);
        assert!(matches!(result, Err(ProtocolError::UnknownMessageType(99))));
    }

    #[test]
    fn test_message_type_tags() {
        assert_eq!(MessageType::Unknown.as_u8(), 0);
        assert_eq!(MessageType::Config.as_u8(), 1);
        assert_eq!(MessageType::SessionData.as_u8(), 2);
        assert_eq!(MessageType::Resize.as_u8(), 3);
        assert_eq!(MessageType::Heartbeat.as_u8(), 4);
        assert_eq!(MessageType::from_u8(5), None);
    }
}
