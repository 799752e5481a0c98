//! Response body types and their decoders.

use crate::error::ProtocolError;
use crate::frame::ProtocolVersion;
use crate::message::ResponseType;
use crate::primitive;
use bytes::{Buf, Bytes};
use std::collections::HashMap;

/// The closed set of response bodies, one per response opcode.
///
/// RESULT and EVENT bodies are carried opaque past their envelope fields:
/// row deserialization belongs to the layer above this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Error {
        code: i32,
        message: String,
        /// Code-specific trailing fields (unavailable/write-timeout
        /// details and the like), left undecoded.
        details: Bytes,
    },
    Ready,
    Authenticate {
        authenticator: String,
    },
    Supported {
        options: HashMap<String, Vec<String>>,
    },
    Result {
        body: Bytes,
    },
    Event {
        event_type: String,
        body: Bytes,
    },
    AuthChallenge {
        token: Option<Bytes>,
    },
    AuthSuccess {
        token: Option<Bytes>,
    },
}

impl ResponseBody {
    /// Decodes the type-specific body for `kind` from the remaining frame
    /// bytes.
    pub fn decode(
        kind: ResponseType,
        buf: &mut Bytes,
        _version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        let body = match kind {
            ResponseType::Error => {
                let code = primitive::read_int(buf)?;
                let message = primitive::read_string(buf)?;
                let details = buf.copy_to_bytes(buf.remaining());
                ResponseBody::Error {
                    code,
                    message,
                    details,
                }
            }
            ResponseType::Ready => ResponseBody::Ready,
            ResponseType::Authenticate => ResponseBody::Authenticate {
                authenticator: primitive::read_string(buf)?,
            },
            ResponseType::Supported => ResponseBody::Supported {
                options: primitive::read_string_multimap(buf)?,
            },
            ResponseType::Result => ResponseBody::Result {
                body: buf.copy_to_bytes(buf.remaining()),
            },
            ResponseType::Event => ResponseBody::Event {
                event_type: primitive::read_string(buf)?,
                body: buf.copy_to_bytes(buf.remaining()),
            },
            ResponseType::AuthChallenge => ResponseBody::AuthChallenge {
                token: primitive::read_bytes(buf)?,
            },
            ResponseType::AuthSuccess => ResponseBody::AuthSuccess {
                token: primitive::read_bytes(buf)?,
            },
        };
        Ok(body)
    }
}
