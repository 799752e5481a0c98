//! Message taxonomy: request/response envelopes, the opcode-to-type
//! registries, and type-dependent derived accessors.
//!
//! An envelope is built once per send or receive and never mutated after
//! handoff to the encode/decode boundary, so no synchronization is needed
//! around a message instance. The registries are built once, validated
//! for opcode uniqueness, and shared read-only across all connections.

use crate::error::ProtocolError;
use crate::payload::CustomPayload;
use crate::request::{Consistency, RequestBody};
use crate::response::ResponseBody;
use bytes::Bytes;
use std::sync::LazyLock;
use uuid::Uuid;

/// Request message kinds and their opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestType {
    Startup = 0x01,
    Credentials = 0x04,
    Options = 0x05,
    Query = 0x07,
    Prepare = 0x09,
    Execute = 0x0A,
    Register = 0x0B,
    Batch = 0x0D,
    AuthResponse = 0x0F,
}

impl RequestType {
    pub const ALL: [RequestType; 9] = [
        RequestType::Startup,
        RequestType::Credentials,
        RequestType::Options,
        RequestType::Query,
        RequestType::Prepare,
        RequestType::Execute,
        RequestType::Register,
        RequestType::Batch,
        RequestType::AuthResponse,
    ];

    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// O(1) table lookup; fails with [`ProtocolError::UnknownOpcode`] for
    /// an unregistered opcode.
    pub fn from_opcode(opcode: u8) -> Result<Self, ProtocolError> {
        REQUEST_TYPES
            .get(opcode)
            .ok_or(ProtocolError::UnknownOpcode { opcode })
    }
}

/// Response message kinds and their opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseType {
    Error = 0x00,
    Ready = 0x02,
    Authenticate = 0x03,
    Supported = 0x06,
    Result = 0x08,
    Event = 0x0C,
    AuthChallenge = 0x0E,
    AuthSuccess = 0x10,
}

impl ResponseType {
    pub const ALL: [ResponseType; 8] = [
        ResponseType::Error,
        ResponseType::Ready,
        ResponseType::Authenticate,
        ResponseType::Supported,
        ResponseType::Result,
        ResponseType::Event,
        ResponseType::AuthChallenge,
        ResponseType::AuthSuccess,
    ];

    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// O(1) table lookup; fails with [`ProtocolError::UnknownOpcode`] for
    /// an unregistered opcode. This runs on every received frame.
    pub fn from_opcode(opcode: u8) -> Result<Self, ProtocolError> {
        RESPONSE_TYPES
            .get(opcode)
            .ok_or(ProtocolError::UnknownOpcode { opcode })
    }
}

/// Dense direct-mapped opcode table. Construction fails on a duplicate
/// opcode; lookups are a single index.
#[derive(Debug)]
pub struct OpcodeTable<T> {
    slots: Vec<Option<T>>,
}

impl<T: Copy> OpcodeTable<T> {
    pub fn build(
        entries: impl IntoIterator<Item = (u8, T)>,
    ) -> Result<Self, ProtocolError> {
        let entries: Vec<(u8, T)> = entries.into_iter().collect();
        let max = entries.iter().map(|(op, _)| *op).max().unwrap_or(0);
        let mut slots = vec![None; max as usize + 1];
        for (opcode, value) in entries {
            let slot = &mut slots[opcode as usize];
            if slot.is_some() {
                return Err(ProtocolError::DuplicateOpcode { opcode });
            }
            *slot = Some(value);
        }
        Ok(Self { slots })
    }

    pub fn get(&self, opcode: u8) -> Option<T> {
        self.slots.get(opcode as usize).copied().flatten()
    }
}

// A duplicate opcode here is a fatal misconfiguration of the crate
// itself; the tables are touched before the first frame is processed.
static REQUEST_TYPES: LazyLock<OpcodeTable<RequestType>> = LazyLock::new(|| {
    OpcodeTable::build(RequestType::ALL.iter().map(|t| (t.opcode(), *t)))
        .expect("request opcode table")
});

static RESPONSE_TYPES: LazyLock<OpcodeTable<ResponseType>> = LazyLock::new(|| {
    OpcodeTable::build(ResponseType::ALL.iter().map(|t| (t.opcode(), *t)))
        .expect("response opcode table")
});

/// An outbound message: a typed body plus the envelope fields set by the
/// caller right before transmission. One instance per in-flight request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Correlates the response to this request on a shared connection.
    /// Assigned by the connection layer; read-only once encoding begins.
    pub stream: i16,
    tracing: bool,
    payload: Option<CustomPayload>,
    pub body: RequestBody,
}

impl Request {
    pub fn new(body: RequestBody) -> Self {
        Self {
            stream: 0,
            tracing: false,
            payload: None,
            body,
        }
    }

    pub fn with_stream(mut self, stream: i16) -> Self {
        self.stream = stream;
        self
    }

    /// Asks the server to trace this request.
    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Attaches a custom payload. Legal on the wire only from protocol V4
    /// on; the encoder enforces the gate per request, since the version is
    /// only known once a connection's handshake has completed.
    pub fn with_payload(mut self, payload: CustomPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn tracing_requested(&self) -> bool {
        self.tracing
    }

    pub fn custom_payload(&self) -> Option<&CustomPayload> {
        self.payload.as_ref()
    }

    pub fn request_type(&self) -> RequestType {
        match self.body {
            RequestBody::Startup { .. } => RequestType::Startup,
            RequestBody::Credentials { .. } => RequestType::Credentials,
            RequestBody::Options => RequestType::Options,
            RequestBody::Query { .. } => RequestType::Query,
            RequestBody::Prepare { .. } => RequestType::Prepare,
            RequestBody::Execute { .. } => RequestType::Execute,
            RequestBody::Register { .. } => RequestType::Register,
            RequestBody::Batch { .. } => RequestType::Batch,
            RequestBody::AuthResponse { .. } => RequestType::AuthResponse,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.request_type().opcode()
    }

    /// Consistency level, for the request kinds that carry one
    /// (QUERY, EXECUTE, BATCH). Absent for the others; that is normal,
    /// not an error.
    pub fn consistency(&self) -> Option<Consistency> {
        match &self.body {
            RequestBody::Query { params, .. } | RequestBody::Execute { params, .. } => {
                Some(params.consistency)
            }
            RequestBody::Batch { consistency, .. } => Some(*consistency),
            _ => None,
        }
    }

    pub fn serial_consistency(&self) -> Option<Consistency> {
        match &self.body {
            RequestBody::Query { params, .. } | RequestBody::Execute { params, .. } => {
                params.serial_consistency
            }
            RequestBody::Batch {
                serial_consistency, ..
            } => *serial_consistency,
            _ => None,
        }
    }

    pub fn default_timestamp(&self) -> Option<i64> {
        match &self.body {
            RequestBody::Query { params, .. } | RequestBody::Execute { params, .. } => {
                params.default_timestamp
            }
            RequestBody::Batch {
                default_timestamp, ..
            } => *default_timestamp,
            _ => None,
        }
    }

    /// Paging state, for QUERY and EXECUTE only.
    pub fn paging_state(&self) -> Option<&Bytes> {
        match &self.body {
            RequestBody::Query { params, .. } | RequestBody::Execute { params, .. } => {
                params.paging_state.as_ref()
            }
            _ => None,
        }
    }
}

/// An inbound message: a typed body plus the envelope fields recovered
/// from the frame. Immutable once produced by the decoder.
#[derive(Debug, Clone)]
pub struct Response {
    pub stream: i16,
    /// Present only if the frame carried the TRACING flag.
    pub tracing_id: Option<Uuid>,
    /// Present only if the frame carried the CUSTOM_PAYLOAD flag; built
    /// fresh from wire bytes and never mutated afterwards.
    pub payload: Option<CustomPayload>,
    pub body: ResponseBody,
}

impl Response {
    pub fn response_type(&self) -> ResponseType {
        match self.body {
            ResponseBody::Error { .. } => ResponseType::Error,
            ResponseBody::Ready => ResponseType::Ready,
            ResponseBody::Authenticate { .. } => ResponseType::Authenticate,
            ResponseBody::Supported { .. } => ResponseType::Supported,
            ResponseBody::Result { .. } => ResponseType::Result,
            ResponseBody::Event { .. } => ResponseType::Event,
            ResponseBody::AuthChallenge { .. } => ResponseType::AuthChallenge,
            ResponseBody::AuthSuccess { .. } => ResponseType::AuthSuccess,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.response_type().opcode()
    }
}
