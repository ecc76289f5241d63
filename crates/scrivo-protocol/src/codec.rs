//! Frame codec: `u32 length | u8 kind | u8 version | body`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::ProtocolError;
use crate::message::{Message, MessageKind};

/// Current wire version, carried in every frame. A peer speaking another
/// version is cut off rather than misparsed.
pub const PROTOCOL_VERSION: u8 = 1;

/// Upper bound on a single frame. Document snapshots are the only payloads
/// that grow with document size; anything past this is a corrupt length
/// prefix or an abusive peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Length-prefixed [`Message`] codec for `FramedRead` / `FramedWrite`.
///
/// Partial frames leave the read buffer untouched. Frames whose kind byte is
/// unknown are skipped silently (a newer peer talking about something we
/// don't do yet); bad version or malformed body is fatal to the stream.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        loop {
            if src.len() < 4 {
                return Ok(None);
            }
            let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
            if length < 2 {
                return Err(ProtocolError::FrameTooShort);
            }
            if length > MAX_FRAME_LEN {
                return Err(ProtocolError::FrameTooLarge(length));
            }
            if src.len() < 4 + length {
                src.reserve(4 + length - src.len());
                return Ok(None);
            }

            src.advance(4);
            let mut frame = src.split_to(length).freeze();
            let kind_byte = frame.get_u8();
            let version = frame.get_u8();
            if version != PROTOCOL_VERSION {
                return Err(ProtocolError::VersionMismatch {
                    expected: PROTOCOL_VERSION,
                    got: version,
                });
            }

            let Some(kind) = MessageKind::from_repr(kind_byte) else {
                trace!(kind = kind_byte, length, "skipping frame of unknown kind");
                continue;
            };
            return Ok(Some(Message::decode_body(kind, &mut frame)?));
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let mut body = BytesMut::new();
        message.encode_body(&mut body)?;

        let length = body.len() + 2;
        if length > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(length));
        }
        dst.reserve(4 + length);
        dst.put_u32(length as u32);
        dst.put_u8(message.kind() as u8);
        dst.put_u8(PROTOCOL_VERSION);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FailureKind;

    fn encode(message: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        MessageCodec.encode(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_roundtrip_through_codec() {
        let message = Message::LoginRequest {
            username: "alice".into(),
        };
        let mut buf = encode(message.clone());
        let decoded = MessageCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_does_not_advance() {
        let full = encode(Message::DocumentCreate {
            name: "notes".into(),
        });

        let mut codec = MessageCodec;
        let mut buf = BytesMut::new();

        // Feed everything except the last byte: no message, nothing consumed
        // beyond the staging buffer.
        buf.extend_from_slice(&full[..full.len() - 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 1..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.kind(), MessageKind::DocumentCreate);
    }

    #[test]
    fn test_byte_at_a_time() {
        let full = encode(Message::Failure {
            kind: FailureKind::NameCollision,
            context: "doc".into(),
        });

        let mut codec = MessageCodec;
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for byte in full.iter() {
            buf.put_u8(*byte);
            if let Some(message) = codec.decode(&mut buf).unwrap() {
                decoded = Some(message);
            }
        }
        assert!(matches!(decoded, Some(Message::Failure { .. })));
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut buf = encode(Message::Logout);
        buf.extend_from_slice(&encode(Message::DocumentClose));

        let mut codec = MessageCodec;
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Logout));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::DocumentClose));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        // A frame with kind 0x7f (unassigned), followed by a real one.
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_u8(0x7f);
        buf.put_u8(PROTOCOL_VERSION);
        buf.extend_from_slice(&encode(Message::Logout));

        let decoded = MessageCodec.decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(Message::Logout));
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_u8(MessageKind::Logout as u8);
        buf.put_u8(PROTOCOL_VERSION + 1);

        let err = MessageCodec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::VersionMismatch { got: 2, .. }));
    }

    #[test]
    fn test_oversized_length_prefix_is_fatal() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        buf.put_u8(0);
        let err = MessageCodec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
    }
}
