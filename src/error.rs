//! Protocol error types.

use crate::frame::ProtocolVersion;
use thiserror::Error;

/// Protocol-level errors that can occur during framing, encoding or
/// decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A custom payload entry carries an absent (null) value. This is a
    /// programming error on the caller's side and is detected before any
    /// byte is written.
    #[error("custom payload value for key {key:?} must not be null")]
    NullPayloadValue { key: String },

    /// A feature was used under a negotiated protocol version that does
    /// not support it.
    #[error("{feature} not supported by protocol {version}")]
    UnsupportedFeature {
        version: ProtocolVersion,
        feature: &'static str,
    },

    /// A received frame carries an opcode with no registered message type.
    /// The frame stream cannot be trusted after this.
    #[error("unknown opcode {opcode:#04x}")]
    UnknownOpcode { opcode: u8 },

    /// Two message types were registered under the same opcode. Detected
    /// at table construction, before any frame is processed.
    #[error("duplicate opcode {opcode:#04x} in message type table")]
    DuplicateOpcode { opcode: u8 },

    /// The frame header names a protocol version this crate does not speak.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The frame header carries flag bits outside the defined set.
    #[error("invalid frame flags: {0:#04x}")]
    InvalidFlags(u8),

    /// The frame body ended before a read completed.
    #[error("frame body too short: need {needed} more bytes")]
    BodyTooShort { needed: usize },

    /// The frame body length exceeds the protocol limit.
    #[error("frame body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: u32, max: u32 },

    /// A wire string was not valid UTF-8.
    #[error("invalid UTF-8 in wire string")]
    InvalidUtf8,

    /// A length prefix that must be non-negative was negative.
    #[error("negative length {0} in wire value")]
    NegativeLength(i32),

    /// A consistency code outside the defined set was read.
    #[error("unknown consistency code {0:#06x}")]
    InvalidConsistency(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::NullPayloadValue {
            key: "k1".to_string(),
        };
        assert!(err.to_string().contains("k1"));

        let err = ProtocolError::UnsupportedFeature {
            version: ProtocolVersion::V2,
            feature: "Custom payloads",
        };
        let msg = err.to_string();
        assert!(msg.contains("Custom payloads"));
        assert!(msg.contains("V2"));

        let err = ProtocolError::UnknownOpcode { opcode: 0x42 };
        assert!(err.to_string().contains("0x42"));

        let err = ProtocolError::DuplicateOpcode { opcode: 0x07 };
        assert!(err.to_string().contains("0x07"));

        let err = ProtocolError::BodyTooShort { needed: 12 };
        assert!(err.to_string().contains("12"));

        let err = ProtocolError::BodyTooLarge {
            size: 100,
            max: 50,
        };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::InvalidFlags(0xF0);
        assert!(err.to_string().to_lowercase().contains("0xf0"));
    }
}
