//! The two directional translation stages at the edge of the transport:
//! typed requests into frames, frames into typed responses.
//!
//! Both stages are plain synchronous functions, safe to invoke
//! concurrently for different frames; no state is shared between calls
//! beyond the immutable opcode tables.

use crate::error::ProtocolError;
use crate::frame::{Frame, FrameFlags, ProtocolVersion};
use crate::message::{Request, Response, ResponseType};
use crate::payload::{format_payload, CustomPayload};
use crate::primitive;
use crate::response::ResponseBody;
use bytes::BytesMut;

/// Outbound stage: one request plus the negotiated version in, one frame
/// out.
pub struct ProtocolEncoder;

impl ProtocolEncoder {
    /// Encodes a request into a frame.
    ///
    /// The custom-payload version gate and null-value check run before
    /// any buffer is allocated, so a failure never produces a partial
    /// frame. The payload, if any, is written ahead of the type-specific
    /// body, matching the decode order on the inbound path.
    pub fn encode(
        request: &Request,
        version: ProtocolVersion,
    ) -> Result<Frame, ProtocolError> {
        let mut flags = FrameFlags::new();
        if request.tracing_requested() {
            flags = flags.with_tracing();
        }

        let payload = request.custom_payload();
        let mut payload_size = 0;
        if let Some(payload) = payload {
            CustomPayload::check_version(version)?;
            payload_size = payload.encoded_size()?;
            flags = flags.with_custom_payload();
        }

        let body_size = payload_size + request.body.encoded_size(version)?;
        let mut body = BytesMut::with_capacity(body_size);

        if let Some(payload) = payload {
            payload.encode(&mut body)?;
            tracing::trace!(
                "Sending payload: {} ({} bytes total)",
                format_payload(Some(payload)),
                payload_size
            );
        }
        request.body.encode(&mut body, version)?;
        debug_assert_eq!(body.len(), body_size);

        Ok(Frame::create(
            version,
            request.opcode(),
            request.stream,
            flags,
            body.freeze(),
        ))
    }
}

/// Inbound stage: one frame in, one typed response out.
pub struct ProtocolDecoder;

impl ProtocolDecoder {
    /// Decodes a frame into a response.
    ///
    /// The body prefix is consumed in the contractual order: tracing id
    /// first if the TRACING flag is set, custom payload map next if the
    /// CUSTOM_PAYLOAD flag is set, then the opcode-specific body. The
    /// frame body is consumed by value and released on every exit path,
    /// success or failure.
    pub fn decode(frame: Frame) -> Result<Response, ProtocolError> {
        let header = frame.header;
        let mut body = frame.body;

        let tracing_id = if header.flags.has_tracing() {
            Some(primitive::read_uuid(&mut body)?)
        } else {
            None
        };
        let payload = if header.flags.has_custom_payload() {
            Some(CustomPayload::decode(&mut body)?)
        } else {
            None
        };

        if let Some(payload) = &payload {
            tracing::trace!(
                "Received payload: {} ({} bytes total)",
                format_payload(Some(payload)),
                payload.wire_size()
            );
        }

        let kind = ResponseType::from_opcode(header.opcode)?;
        let response_body = ResponseBody::decode(kind, &mut body, header.version)?;

        Ok(Response {
            stream: header.stream,
            tracing_id,
            payload,
            body: response_body,
        })
    }
}
