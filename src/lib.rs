//! # cql-wire
//!
//! Message framing and codec layer for the CQL native protocol.
//!
//! This crate provides:
//! - Binary frame model (header, flags, stream id, opcode, body)
//! - Request/response message taxonomy bound to protocol opcodes
//! - Custom payload encoding with protocol-version gating
//! - The protocol encoder/decoder that translates between typed
//!   messages and frames
//!
//! Transport concerns (connection management, stream-id allocation,
//! retries) live outside this crate; encode and decode are synchronous,
//! buffer-bounded transformations invoked per frame by the surrounding
//! I/O layer.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod payload;
pub mod primitive;
pub mod request;
pub mod response;

pub use codec::{ProtocolDecoder, ProtocolEncoder};
pub use error::ProtocolError;
pub use frame::{Frame, FrameFlags, FrameHeader, ProtocolVersion, FRAME_HEADER_SIZE};
pub use message::{Request, RequestType, Response, ResponseType};
pub use payload::CustomPayload;
pub use request::{BatchKind, BatchStatement, Consistency, QueryParameters, RequestBody};
pub use response::ResponseBody;

/// Maximum frame body size (256 MiB, the native protocol limit).
pub const MAX_BODY_SIZE: u32 = 256 * 1024 * 1024;
