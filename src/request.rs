//! Request body types and their encoders.
//!
//! Each variant encodes itself into a pre-sized buffer and reports its
//! exact encoded length up front; the two must agree byte-for-byte since
//! the protocol encoder allocates frame bodies from the reported sizes.

use crate::error::ProtocolError;
use crate::frame::ProtocolVersion;
use crate::primitive;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

/// CQL version announced in STARTUP.
const CQL_VERSION: &str = "3.0.0";

/// Consistency level carried by QUERY, EXECUTE and BATCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Consistency {
    Any = 0x0000,
    One = 0x0001,
    Two = 0x0002,
    Three = 0x0003,
    Quorum = 0x0004,
    All = 0x0005,
    LocalQuorum = 0x0006,
    EachQuorum = 0x0007,
    Serial = 0x0008,
    LocalSerial = 0x0009,
    LocalOne = 0x000A,
}

impl Consistency {
    pub fn from_code(code: u16) -> Result<Self, ProtocolError> {
        match code {
            0x0000 => Ok(Consistency::Any),
            0x0001 => Ok(Consistency::One),
            0x0002 => Ok(Consistency::Two),
            0x0003 => Ok(Consistency::Three),
            0x0004 => Ok(Consistency::Quorum),
            0x0005 => Ok(Consistency::All),
            0x0006 => Ok(Consistency::LocalQuorum),
            0x0007 => Ok(Consistency::EachQuorum),
            0x0008 => Ok(Consistency::Serial),
            0x0009 => Ok(Consistency::LocalSerial),
            0x000A => Ok(Consistency::LocalOne),
            other => Err(ProtocolError::InvalidConsistency(other)),
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Per-statement execution parameters for QUERY and EXECUTE.
///
/// The v2+ wire layout is consistency, a flags byte, then the optional
/// sections in flag order: values, page size, paging state, serial
/// consistency, default timestamp (v3+). V1 carries consistency only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub consistency: Consistency,
    /// Positional bind values; a `None` value binds null.
    pub values: Vec<Option<Bytes>>,
    pub page_size: Option<i32>,
    pub paging_state: Option<Bytes>,
    pub serial_consistency: Option<Consistency>,
    pub default_timestamp: Option<i64>,
}

impl QueryParameters {
    pub fn new(consistency: Consistency) -> Self {
        Self {
            consistency,
            values: Vec::new(),
            page_size: None,
            paging_state: None,
            serial_consistency: None,
            default_timestamp: None,
        }
    }

    const FLAG_VALUES: u8 = 0x01;
    const FLAG_PAGE_SIZE: u8 = 0x04;
    const FLAG_PAGING_STATE: u8 = 0x08;
    const FLAG_SERIAL_CONSISTENCY: u8 = 0x10;
    const FLAG_DEFAULT_TIMESTAMP: u8 = 0x20;

    fn flags(&self, version: ProtocolVersion) -> u8 {
        let mut flags = 0;
        if !self.values.is_empty() {
            flags |= Self::FLAG_VALUES;
        }
        if self.page_size.is_some() {
            flags |= Self::FLAG_PAGE_SIZE;
        }
        if self.paging_state.is_some() {
            flags |= Self::FLAG_PAGING_STATE;
        }
        if self.serial_consistency.is_some() {
            flags |= Self::FLAG_SERIAL_CONSISTENCY;
        }
        if version >= ProtocolVersion::V3 && self.default_timestamp.is_some() {
            flags |= Self::FLAG_DEFAULT_TIMESTAMP;
        }
        flags
    }

    fn encode(&self, buf: &mut impl BufMut, version: ProtocolVersion) {
        buf.put_u16(self.consistency.code());
        if version < ProtocolVersion::V2 {
            return;
        }
        let flags = self.flags(version);
        buf.put_u8(flags);
        if flags & Self::FLAG_VALUES != 0 {
            write_values(&self.values, buf);
        }
        if flags & Self::FLAG_PAGE_SIZE != 0 {
            // flag implies presence
            buf.put_i32(self.page_size.unwrap_or_default());
        }
        if flags & Self::FLAG_PAGING_STATE != 0 {
            primitive::write_bytes(self.paging_state.as_deref(), buf);
        }
        if flags & Self::FLAG_SERIAL_CONSISTENCY != 0 {
            buf.put_u16(
                self.serial_consistency
                    .unwrap_or(Consistency::Serial)
                    .code(),
            );
        }
        if flags & Self::FLAG_DEFAULT_TIMESTAMP != 0 {
            buf.put_i64(self.default_timestamp.unwrap_or_default());
        }
    }

    fn encoded_size(&self, version: ProtocolVersion) -> usize {
        if version < ProtocolVersion::V2 {
            return 2;
        }
        let flags = self.flags(version);
        let mut size = 2 + 1;
        if flags & Self::FLAG_VALUES != 0 {
            size += size_of_values(&self.values);
        }
        if flags & Self::FLAG_PAGE_SIZE != 0 {
            size += 4;
        }
        if flags & Self::FLAG_PAGING_STATE != 0 {
            size += primitive::size_of_bytes(self.paging_state.as_deref());
        }
        if flags & Self::FLAG_SERIAL_CONSISTENCY != 0 {
            size += 2;
        }
        if flags & Self::FLAG_DEFAULT_TIMESTAMP != 0 {
            size += 8;
        }
        size
    }
}

fn write_values(values: &[Option<Bytes>], buf: &mut impl BufMut) {
    buf.put_u16(values.len() as u16);
    for value in values {
        primitive::write_bytes(value.as_deref(), buf);
    }
}

fn size_of_values(values: &[Option<Bytes>]) -> usize {
    2 + values
        .iter()
        .map(|v| primitive::size_of_bytes(v.as_deref()))
        .sum::<usize>()
}

/// One statement inside a BATCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatement {
    /// Unprepared query string.
    Query { query: String, values: Vec<Option<Bytes>> },
    /// Prepared statement id.
    Prepared { id: Bytes, values: Vec<Option<Bytes>> },
}

/// BATCH kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchKind {
    Logged = 0,
    Unlogged = 1,
    Counter = 2,
}

/// The closed set of request bodies, one per request opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Startup {
        compression: Option<String>,
    },
    /// V1-only authentication; later versions use AUTH_RESPONSE.
    Credentials {
        credentials: Vec<(String, String)>,
    },
    Options,
    Query {
        query: String,
        params: QueryParameters,
    },
    Prepare {
        query: String,
    },
    Execute {
        statement_id: Bytes,
        params: QueryParameters,
    },
    Register {
        event_types: Vec<String>,
    },
    Batch {
        kind: BatchKind,
        statements: Vec<BatchStatement>,
        consistency: Consistency,
        serial_consistency: Option<Consistency>,
        default_timestamp: Option<i64>,
    },
    AuthResponse {
        token: Option<Bytes>,
    },
}

impl RequestBody {
    /// Encodes the type-specific body. Never emits partial output on
    /// failure: version checks run before the first byte is written.
    pub fn encode(
        &self,
        buf: &mut BytesMut,
        version: ProtocolVersion,
    ) -> Result<(), ProtocolError> {
        match self {
            RequestBody::Startup { compression } => {
                primitive::write_string_map(&startup_options(compression.as_deref()), buf);
            }
            RequestBody::Credentials { credentials } => {
                buf.put_u16(credentials.len() as u16);
                for (key, value) in credentials {
                    primitive::write_string(key, buf);
                    primitive::write_string(value, buf);
                }
            }
            RequestBody::Options => {}
            RequestBody::Query { query, params } => {
                primitive::write_long_string(query, buf);
                params.encode(buf, version);
            }
            RequestBody::Prepare { query } => {
                primitive::write_long_string(query, buf);
            }
            RequestBody::Execute {
                statement_id,
                params,
            } => {
                primitive::write_short_bytes(statement_id, buf);
                if version < ProtocolVersion::V2 {
                    // v1 layout: values then bare consistency
                    write_values(&params.values, buf);
                    buf.put_u16(params.consistency.code());
                } else {
                    params.encode(buf, version);
                }
            }
            RequestBody::Register { event_types } => {
                primitive::write_string_list(event_types, buf);
            }
            RequestBody::Batch {
                kind,
                statements,
                consistency,
                serial_consistency,
                default_timestamp,
            } => {
                check_batch_version(version)?;
                buf.put_u8(*kind as u8);
                buf.put_u16(statements.len() as u16);
                for statement in statements {
                    match statement {
                        BatchStatement::Query { query, values } => {
                            buf.put_u8(0);
                            primitive::write_long_string(query, buf);
                            write_values(values, buf);
                        }
                        BatchStatement::Prepared { id, values } => {
                            buf.put_u8(1);
                            primitive::write_short_bytes(id, buf);
                            write_values(values, buf);
                        }
                    }
                }
                buf.put_u16(consistency.code());
                if version >= ProtocolVersion::V3 {
                    let flags = batch_flags(serial_consistency, default_timestamp);
                    buf.put_u8(flags);
                    if let Some(serial) = serial_consistency {
                        buf.put_u16(serial.code());
                    }
                    if let Some(timestamp) = default_timestamp {
                        buf.put_i64(*timestamp);
                    }
                }
            }
            RequestBody::AuthResponse { token } => {
                primitive::write_bytes(token.as_deref(), buf);
            }
        }
        Ok(())
    }

    /// Exact length [`encode`](Self::encode) will produce for `version`.
    pub fn encoded_size(&self, version: ProtocolVersion) -> Result<usize, ProtocolError> {
        let size = match self {
            RequestBody::Startup { compression } => {
                primitive::size_of_string_map(&startup_options(compression.as_deref()))
            }
            RequestBody::Credentials { credentials } => {
                2 + credentials
                    .iter()
                    .map(|(k, v)| primitive::size_of_string(k) + primitive::size_of_string(v))
                    .sum::<usize>()
            }
            RequestBody::Options => 0,
            RequestBody::Query { query, params } => {
                primitive::size_of_long_string(query) + params.encoded_size(version)
            }
            RequestBody::Prepare { query } => primitive::size_of_long_string(query),
            RequestBody::Execute {
                statement_id,
                params,
            } => {
                let id = primitive::size_of_short_bytes(statement_id);
                if version < ProtocolVersion::V2 {
                    id + size_of_values(&params.values) + 2
                } else {
                    id + params.encoded_size(version)
                }
            }
            RequestBody::Register { event_types } => primitive::size_of_string_list(event_types),
            RequestBody::Batch {
                statements,
                serial_consistency,
                default_timestamp,
                ..
            } => {
                check_batch_version(version)?;
                let mut size = 1 + 2;
                for statement in statements {
                    size += match statement {
                        BatchStatement::Query { query, values } => {
                            1 + primitive::size_of_long_string(query) + size_of_values(values)
                        }
                        BatchStatement::Prepared { id, values } => {
                            1 + primitive::size_of_short_bytes(id) + size_of_values(values)
                        }
                    };
                }
                size += 2;
                if version >= ProtocolVersion::V3 {
                    size += 1;
                    if serial_consistency.is_some() {
                        size += 2;
                    }
                    if default_timestamp.is_some() {
                        size += 8;
                    }
                }
                size
            }
            RequestBody::AuthResponse { token } => primitive::size_of_bytes(token.as_deref()),
        };
        Ok(size)
    }
}

fn startup_options(compression: Option<&str>) -> BTreeMap<String, String> {
    let mut options = BTreeMap::new();
    options.insert("CQL_VERSION".to_string(), CQL_VERSION.to_string());
    if let Some(algorithm) = compression {
        options.insert("COMPRESSION".to_string(), algorithm.to_string());
    }
    options
}

fn check_batch_version(version: ProtocolVersion) -> Result<(), ProtocolError> {
    if version < ProtocolVersion::V2 {
        return Err(ProtocolError::UnsupportedFeature {
            version,
            feature: "BATCH messages",
        });
    }
    Ok(())
}

fn batch_flags(
    serial_consistency: &Option<Consistency>,
    default_timestamp: &Option<i64>,
) -> u8 {
    let mut flags = 0;
    if serial_consistency.is_some() {
        flags |= QueryParameters::FLAG_SERIAL_CONSISTENCY;
    }
    if default_timestamp.is_some() {
        flags |= QueryParameters::FLAG_DEFAULT_TIMESTAMP;
    }
    flags
}
