//! Codec for encoding and decoding deliveries.
//!
//! Recorded feeds use MessagePack with length-prefixed framing. Hand-written
//! feeds use one JSON delivery per line.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::delivery::Delivery;

/// Maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// JSON line could not be parsed.
    #[error("Invalid JSON delivery: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a delivery to bytes.
///
/// The encoded format is:
/// - 4 bytes: Big-endian length prefix
/// - N bytes: MessagePack-encoded delivery
///
/// # Errors
///
/// Returns an error if the delivery is too large or encoding fails.
pub fn encode(delivery: &Delivery) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    encode_into(delivery, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a delivery into an existing buffer.
///
/// # Errors
///
/// Returns an error if the delivery is too large or encoding fails.
pub fn encode_into(delivery: &Delivery, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let payload = rmp_serde::to_vec_named(delivery)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    buf.reserve(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);

    Ok(())
}

/// Read the length prefix, if present, and check it against the size cap.
fn frame_length(data: &[u8]) -> Result<Option<usize>, ProtocolError> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    Ok(Some(length))
}

/// Decode a delivery from bytes.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode(data: &[u8]) -> Result<Delivery, ProtocolError> {
    let Some(length) = frame_length(data)? else {
        return Err(ProtocolError::Incomplete(LENGTH_PREFIX_SIZE - data.len()));
    };

    let total_size = LENGTH_PREFIX_SIZE + length;
    if data.len() < total_size {
        return Err(ProtocolError::Incomplete(total_size - data.len()));
    }

    let delivery = rmp_serde::from_slice(&data[LENGTH_PREFIX_SIZE..total_size])?;
    Ok(delivery)
}

/// Try to decode a delivery from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(delivery))` if a complete frame was decoded,
/// `Ok(None)` if more data is needed, or `Err` on protocol error.
///
/// # Errors
///
/// Returns an error if the frame is too large or invalid.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Delivery>, ProtocolError> {
    let Some(length) = frame_length(&buf[..])? else {
        return Ok(None);
    };

    if buf.len() < LENGTH_PREFIX_SIZE + length {
        return Ok(None);
    }

    buf.advance(LENGTH_PREFIX_SIZE);
    let payload = buf.split_to(length);
    let delivery = rmp_serde::from_slice(&payload)?;

    Ok(Some(delivery))
}

/// Decode one JSON-lines delivery.
///
/// Blank lines and lines starting with `#` yield `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the line is not a valid delivery.
pub fn decode_json_line(line: &str) -> Result<Option<Delivery>, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::RoomPage;
    use crate::event::{types, Event};
    use serde_json::json;

    fn sample_event(id: &str) -> Event {
        Event::new(types::ROOM_MESSAGE)
            .with_id(id)
            .in_room("!room:hs")
            .from_user("@alice:hs")
            .with_content(json!({"msgtype": "m.text", "body": "hi"}))
            .at(1_700_000_000_000)
    }

    #[test]
    fn test_encode_decode_deliveries() {
        let deliveries = vec![
            Delivery::live(vec![sample_event("$1"), sample_event("$2")]),
            Delivery::page("!room:hs", RoomPage::new(vec![sample_event("$0")], "t1")),
            Delivery::InitialSyncDone {
                payload: json!({"rooms": 3}),
            },
            Delivery::ResetMessages {
                room_id: "!room:hs".to_string(),
            },
        ];

        for delivery in deliveries {
            let encoded = encode(&delivery).unwrap();
            let decoded = decode(&encoded).unwrap();
            assert_eq!(delivery, decoded);
        }
    }

    #[test]
    fn test_decode_incomplete() {
        let encoded = encode(&Delivery::live(vec![sample_event("$1")])).unwrap();

        match decode(&encoded[..5]) {
            Err(ProtocolError::Incomplete(_)) => {}
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_too_large() {
        let mut header = BytesMut::new();
        header.put_u32((MAX_FRAME_SIZE + 1) as u32);

        match decode(&header) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_decode() {
        let first = Delivery::live(vec![sample_event("$1")]);
        let second = Delivery::state(vec![sample_event("$2")]);

        let mut buf = BytesMut::new();
        encode_into(&first, &mut buf).unwrap();
        encode_into(&second, &mut buf).unwrap();

        // A partial trailing frame must be left in place.
        let tail = encode(&first).unwrap();
        buf.extend_from_slice(&tail[..3]);

        assert_eq!(decode_from(&mut buf).unwrap(), Some(first));
        assert_eq!(decode_from(&mut buf).unwrap(), Some(second));
        assert_eq!(decode_from(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_json_lines() {
        assert!(decode_json_line("").unwrap().is_none());
        assert!(decode_json_line("# recorded 2026-10-01").unwrap().is_none());

        let delivery = decode_json_line(r#"{"kind": "reset_messages", "room_id": "!r:hs"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::ResetMessages {
                room_id: "!r:hs".to_string()
            }
        );

        assert!(matches!(
            decode_json_line("{not json"),
            Err(ProtocolError::Json(_))
        ));
    }
}
