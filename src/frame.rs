//! Binary frame format for the CQL native protocol.
//!
//! Frame layout (9 bytes header + body):
//!
//! ```text
//! +---------+--------+-----------+--------+-------------+
//! | version | flags  | stream id | opcode | body length |
//! | 1 byte  | 1 byte | 2 bytes   | 1 byte |  4 bytes    |
//! +---------+--------+-----------+--------+-------------+
//! | body (body length bytes)                            |
//! +-----------------------------------------------------+
//! ```
//!
//! When the TRACING and/or CUSTOM_PAYLOAD flags are set the body starts
//! with a fixed-order prefix ahead of the opcode-specific payload:
//! tracing id first (16 bytes) if TRACING is set, then the custom payload
//! map if CUSTOM_PAYLOAD is set. This ordering is a protocol contract:
//! encoder and decoder must agree on it or a frame with both flags set
//! becomes unparsable.

use crate::error::ProtocolError;
use crate::MAX_BODY_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the fixed frame header in bytes (1+1+2+1+4 = 9).
pub const FRAME_HEADER_SIZE: usize = 9;

/// Negotiated protocol version. Ordered: a later version supports every
/// feature of an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ProtocolVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,
}

impl ProtocolVersion {
    /// First version supporting custom payloads.
    pub const SUPPORTS_CUSTOM_PAYLOAD: ProtocolVersion = ProtocolVersion::V4;

    pub fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            4 => Ok(ProtocolVersion::V4),
            5 => Ok(ProtocolVersion::V5),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", *self as u8)
    }
}

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Body is compressed (handled by the transport, opaque here).
    pub const COMPRESSED: u8 = 0x01;
    /// Body starts with a 16-byte tracing id.
    pub const TRACING: u8 = 0x02;
    /// Body carries a custom payload map (after the tracing id, if any).
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    /// Body carries server warnings (v4+, opaque here).
    pub const WARNING: u8 = 0x08;

    const VALID_MASK: u8 = 0x0F;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_tracing(mut self) -> Self {
        self.0 |= Self::TRACING;
        self
    }

    pub fn with_custom_payload(mut self) -> Self {
        self.0 |= Self::CUSTOM_PAYLOAD;
        self
    }

    pub fn has_tracing(&self) -> bool {
        self.0 & Self::TRACING != 0
    }

    pub fn has_custom_payload(&self) -> bool {
        self.0 & Self::CUSTOM_PAYLOAD != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    pub fn has_warning(&self) -> bool {
        self.0 & Self::WARNING != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// Parsed frame header. The body length is always derived from the body
/// buffer at encode time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: ProtocolVersion,
    pub flags: FrameFlags,
    /// Identifies one in-flight request/response pair on a shared
    /// connection. Read-only in this crate; allocation and reuse policy
    /// belong to the connection layer.
    pub stream: i16,
    pub opcode: u8,
}

/// One complete wire transmission unit: header plus opaque body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl Frame {
    /// Creates a frame from its parts. Opcode validity is the message
    /// type registry's concern, not checked here.
    pub fn create(
        version: ProtocolVersion,
        opcode: u8,
        stream: i16,
        flags: FrameFlags,
        body: Bytes,
    ) -> Self {
        Self {
            header: FrameHeader {
                version,
                flags,
                stream,
                opcode,
            },
            body,
        }
    }

    /// Encodes the frame into bytes (header followed by body).
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let body_len = self.body.len() as u32;
        if body_len > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge {
                size: body_len,
                max: MAX_BODY_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.body.len());
        buf.put_u8(self.header.version.as_byte());
        buf.put_u8(self.header.flags.bits());
        buf.put_i16(self.header.stream);
        buf.put_u8(self.header.opcode);
        buf.put_u32(body_len);
        buf.put_slice(&self.body);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Peek at header without consuming. The response version byte has
        // its high bit set on the wire; mask it off.
        let version = ProtocolVersion::from_byte(buf[0] & 0x7F)?;
        let flags = FrameFlags::from_bits(buf[1])?;
        let stream = i16::from_be_bytes([buf[2], buf[3]]);
        let opcode = buf[4];
        let body_len = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);

        if body_len > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge {
                size: body_len,
                max: MAX_BODY_SIZE,
            });
        }

        let total_len = FRAME_HEADER_SIZE + body_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let body = buf.split_to(body_len as usize).freeze();

        Ok(Some(Self {
            header: FrameHeader {
                version,
                flags,
                stream,
                opcode,
            },
            body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(ProtocolVersion::V1 < ProtocolVersion::V4);
        assert!(ProtocolVersion::V4 >= ProtocolVersion::SUPPORTS_CUSTOM_PAYLOAD);
        assert!(ProtocolVersion::V3 < ProtocolVersion::SUPPORTS_CUSTOM_PAYLOAD);
    }

    #[test]
    fn test_version_from_byte() {
        assert_eq!(ProtocolVersion::from_byte(4).unwrap(), ProtocolVersion::V4);
        assert!(matches!(
            ProtocolVersion::from_byte(9),
            Err(ProtocolError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_frame_flags() {
        let flags = FrameFlags::new().with_tracing().with_custom_payload();
        assert!(flags.has_tracing());
        assert!(flags.has_custom_payload());
        assert!(!flags.is_compressed());
        assert!(!flags.has_warning());
        assert_eq!(flags.bits(), 0x06);
    }

    #[test]
    fn test_invalid_flags() {
        let result = FrameFlags::from_bits(0x10);
        assert!(matches!(result, Err(ProtocolError::InvalidFlags(0x10))));
    }

    #[test]
    fn test_frame_roundtrip() {
        let body = Bytes::from_static(b"\x00\x01\x02\x03");
        let frame = Frame::create(
            ProtocolVersion::V4,
            0x08,
            42,
            FrameFlags::new().with_tracing(),
            body.clone(),
        );

        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.header.version, ProtocolVersion::V4);
        assert_eq!(decoded.header.opcode, 0x08);
        assert_eq!(decoded.header.stream, 42);
        assert!(decoded.header.flags.has_tracing());
        assert_eq!(decoded.body, body);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_negative_stream_id() {
        let frame = Frame::create(
            ProtocolVersion::V3,
            0x0C,
            -1,
            FrameFlags::new(),
            Bytes::new(),
        );
        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.header.stream, -1);
    }

    #[test]
    fn test_response_version_high_bit() {
        // Server frames set the direction bit; the decoder masks it off.
        let frame = Frame::create(
            ProtocolVersion::V4,
            0x02,
            1,
            FrameFlags::new(),
            Bytes::new(),
        );
        let mut buf = frame.encode().unwrap();
        buf[0] |= 0x80;
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.header.version, ProtocolVersion::V4);
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&b"\x04\x00\x00"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        // Full header claiming a 10-byte body, but only 2 bytes present.
        let mut buf = BytesMut::from(&b"\x04\x00\x00\x01\x02\x00\x00\x00\x0a\xff\xff"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_body_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        buf.put_u8(0);
        buf.put_i16(0);
        buf.put_u8(2);
        buf.put_u32(MAX_BODY_SIZE + 1);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::BodyTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let f1 = Frame::create(
            ProtocolVersion::V4,
            0x02,
            1,
            FrameFlags::new(),
            Bytes::new(),
        );
        let f2 = Frame::create(
            ProtocolVersion::V4,
            0x02,
            2,
            FrameFlags::new(),
            Bytes::new(),
        );

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&f1.encode().unwrap());
        buf.extend_from_slice(&f2.encode().unwrap());

        assert_eq!(Frame::decode(&mut buf).unwrap().unwrap().header.stream, 1);
        assert_eq!(Frame::decode(&mut buf).unwrap().unwrap().header.stream, 2);
        assert!(buf.is_empty());
    }
}
