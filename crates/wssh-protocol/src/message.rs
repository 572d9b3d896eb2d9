//! Message types for the wssh protocol
//!
//! This module gives meaning to decoded frames. A [`Frame`] only knows its
//! tag; a [`Message`] is what the relay acts on.
//!
//! # Message Flow
//!
//! 1. Browser opens the WebSocket; the relay connects to the SSH server
//! 2. Terminal I/O: `SessionData` frames flow in both directions
//! 3. Window resize: `Resize` from the browser, JSON `{"cols": .., "rows": ..}`
//! 4. Keep-alive: browser sends `Heartbeat` "ping", relay answers "pong"
//! 5. Session end: the relay closes the WebSocket; there is no error frame

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::frame::{Frame, MessageType};

/// Heartbeat payload sent by the browser
pub const PING: &[u8] = b"ping";

/// Heartbeat payload sent in reply
pub const PONG: &[u8] = b"pong";

/// Terminal dimensions, also the payload of a resize frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Number of columns
    pub cols: u32,
    /// Number of rows
    pub rows: u32,
}

impl TerminalSize {
    /// Create a new terminal size
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 30 }
    }
}

/// Content of a heartbeat frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    /// Exactly "ping"
    Ping,
    /// Exactly "pong"
    Pong,
    /// Anything else; ignored
    Other,
}

impl Heartbeat {
    fn from_payload(payload: &[u8]) -> Self {
        if payload == PING {
            Heartbeat::Ping
        } else if payload == PONG {
            Heartbeat::Pong
        } else {
            Heartbeat::Other
        }
    }
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    /// Raw terminal bytes
    SessionData(&'a [u8]),

    /// Terminal resize
    Resize(TerminalSize),

    /// Keep-alive
    Heartbeat(Heartbeat),
}

impl<'a> Message<'a> {
    /// Interpret a decoded frame
    pub fn from_frame(frame: Frame<'a>) -> Result<Self, ProtocolError> {
        match frame.message_type {
            MessageType::SessionData => Ok(Message::SessionData(frame.payload)),
            MessageType::Resize => {
                let size: TerminalSize = serde_json::from_slice(frame.payload)?;
                Ok(Message::Resize(size))
            }
            MessageType::Heartbeat => Ok(Message::Heartbeat(Heartbeat::from_payload(
                frame.payload,
            ))),
            MessageType::Config => Err(ProtocolError::ReservedMessageType(
                MessageType::Config.as_u8(),
            )),
            MessageType::Unknown => Err(ProtocolError::UnknownMessageType(
                MessageType::Unknown.as_u8(),
            )),
        }
    }

    /// Decode a message straight from a WebSocket payload
    pub fn decode(src: &'a [u8]) -> Result<Self, ProtocolError> {
        Frame::decode(src).and_then(Self::from_frame)
    }

    /// The reply to a well-formed ping
    pub fn pong() -> Self {
        Message::Heartbeat(Heartbeat::Pong)
    }

    /// Encode the message as a frame into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            Message::SessionData(data) => Frame::new(MessageType::SessionData, data).encode(dst),
            Message::Resize(size) => {
                dst.put_u8(MessageType::Resize.as_u8());
                serde_json::to_writer((&mut *dst).writer(), size)?;
            }
            Message::Heartbeat(beat) => {
                let payload: &[u8] = match beat {
                    Heartbeat::Ping => PING,
                    Heartbeat::Pong => PONG,
                    Heartbeat::Other => &[],
                };
                Frame::new(MessageType::Heartbeat, payload).encode(dst);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_parsed_verbatim() {
        let msg = Message::decode(b"\x03{\"cols\":132,\"rows\":43}").unwrap();
        assert_eq!(msg, Message::Resize(TerminalSize::new(132, 43)));
    }

    #[test]
    fn test_resize_malformed_json() {
        let result = Message::decode(b"\x03{\"cols\":132");
        assert!(matches!(result, Err(ProtocolError::InvalidResize(_))));
    }

    #[test]
    fn test_resize_negative_rejected() {
        let result = Message::decode(b"\x03{\"cols\":-1,\"rows\":24}");
        assert!(matches!(result, Err(ProtocolError::InvalidResize(_))));
    }

    #[test]
    fn test_heartbeat_is_case_sensitive() {
        assert_eq!(
            Message::decode(b"\x04ping").unwrap(),
            Message::Heartbeat(Heartbeat::Ping)
        );
        assert_eq!(
            Message::decode(b"\x04PING").unwrap(),
            Message::Heartbeat(Heartbeat::Other)
        );
        assert_eq!(
            Message::decode(b"\x04pingx").unwrap(),
            Message::Heartbeat(Heartbeat::Other)
        );
    }

    #[test]
    fn test_pong_encoding() {
        let mut buf = BytesMut::new();
        Message::pong().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], b"\x04pong");
    }

    #[test]
    fn test_resize_encoding_roundtrip() {
        let mut buf = BytesMut::new();
        Message::Resize(TerminalSize::new(120, 40))
            .encode(&mut buf)
            .unwrap();
        assert_eq!(
            Message::decode(&buf).unwrap(),
            Message::Resize(TerminalSize::new(120, 40))
        );
    }

    #[test]
    fn test_reserved_and_unknown_tags() {
        assert!(matches!(
            Message::decode(b"\x01{}"),
            Err(ProtocolError::ReservedMessageType(1))
        ));
        assert!(matches!(
            Message::decode(b"\x00abc"),
            Err(ProtocolError::UnknownMessageType(0))
        ));
        assert!(Message::decode(b"\x63abc").unwrap_err().is_unknown_type());
    }

    #[test]
    fn test_terminal_size_default() {
        let size = TerminalSize::default();
        assert_eq!(size.cols, 80);
        assert_eq!(size.rows, 30);
    }
}
