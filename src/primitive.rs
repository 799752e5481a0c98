//! Primitive wire codec: fixed-width integers, strings, UUIDs and
//! byte-keyed maps, read from and written to byte buffers.
//!
//! Every `size_of_*` function must agree byte-for-byte with its `write_*`
//! counterpart; the protocol encoder pre-sizes frame bodies from these
//! sizes, so any divergence corrupts the frame length.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::BodyTooShort {
            needed: needed - buf.remaining(),
        });
    }
    Ok(())
}

pub fn read_unsigned_short(buf: &mut impl Buf) -> Result<u16, ProtocolError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_int(buf: &mut impl Buf) -> Result<i32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

/// Reads a `[string]`: 2-byte length prefix followed by UTF-8 bytes.
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtocolError> {
    let len = read_unsigned_short(buf)? as usize;
    ensure(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Reads a `[long string]`: 4-byte length prefix followed by UTF-8 bytes.
pub fn read_long_string(buf: &mut impl Buf) -> Result<String, ProtocolError> {
    let len = read_int(buf)?;
    let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
    ensure(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Reads a `[uuid]`: 16 raw bytes.
pub fn read_uuid(buf: &mut impl Buf) -> Result<Uuid, ProtocolError> {
    ensure(buf, 16)?;
    let mut raw = [0u8; 16];
    buf.copy_to_slice(&mut raw);
    Ok(Uuid::from_bytes(raw))
}

/// Reads a `[bytes]`: 4-byte length prefix, negative length means absent.
pub fn read_bytes(buf: &mut impl Buf) -> Result<Option<Bytes>, ProtocolError> {
    let len = read_int(buf)?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    ensure(buf, len)?;
    Ok(Some(buf.copy_to_bytes(len)))
}

/// Reads a `[short bytes]`: 2-byte length prefix followed by raw bytes.
pub fn read_short_bytes(buf: &mut impl Buf) -> Result<Bytes, ProtocolError> {
    let len = read_unsigned_short(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

/// Reads a `[string list]`: 2-byte count then that many `[string]`s.
pub fn read_string_list(buf: &mut impl Buf) -> Result<Vec<String>, ProtocolError> {
    let count = read_unsigned_short(buf)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read_string(buf)?);
    }
    Ok(out)
}

/// Reads a `[string map]`: 2-byte count then `[string][string]` pairs.
pub fn read_string_map(buf: &mut impl Buf) -> Result<HashMap<String, String>, ProtocolError> {
    let count = read_unsigned_short(buf)? as usize;
    let mut out = HashMap::with_capacity(count);
    for _ in 0..count {
        let key = read_string(buf)?;
        let value = read_string(buf)?;
        out.insert(key, value);
    }
    Ok(out)
}

/// Reads a `[string multimap]`: 2-byte count then `[string][string list]`
/// pairs.
pub fn read_string_multimap(
    buf: &mut impl Buf,
) -> Result<HashMap<String, Vec<String>>, ProtocolError> {
    let count = read_unsigned_short(buf)? as usize;
    let mut out = HashMap::with_capacity(count);
    for _ in 0..count {
        let key = read_string(buf)?;
        let values = read_string_list(buf)?;
        out.insert(key, values);
    }
    Ok(out)
}

/// Reads a `[bytes map]`: 2-byte count then `[string][bytes]` pairs.
/// Absent (negative length) values decode as `None`.
pub fn read_bytes_map(
    buf: &mut impl Buf,
) -> Result<BTreeMap<String, Option<Bytes>>, ProtocolError> {
    let count = read_unsigned_short(buf)? as usize;
    let mut out = BTreeMap::new();
    for _ in 0..count {
        let key = read_string(buf)?;
        let value = read_bytes(buf)?;
        out.insert(key, value);
    }
    Ok(out)
}

pub fn write_string(s: &str, buf: &mut impl BufMut) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

pub fn size_of_string(s: &str) -> usize {
    2 + s.len()
}

pub fn write_long_string(s: &str, buf: &mut impl BufMut) {
    buf.put_i32(s.len() as i32);
    buf.put_slice(s.as_bytes());
}

pub fn size_of_long_string(s: &str) -> usize {
    4 + s.len()
}

pub fn write_uuid(uuid: &Uuid, buf: &mut impl BufMut) {
    buf.put_slice(uuid.as_bytes());
}

pub fn write_bytes(value: Option<&[u8]>, buf: &mut impl BufMut) {
    match value {
        Some(v) => {
            buf.put_i32(v.len() as i32);
            buf.put_slice(v);
        }
        None => buf.put_i32(-1),
    }
}

pub fn size_of_bytes(value: Option<&[u8]>) -> usize {
    4 + value.map_or(0, <[u8]>::len)
}

pub fn write_short_bytes(value: &[u8], buf: &mut impl BufMut) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
}

pub fn size_of_short_bytes(value: &[u8]) -> usize {
    2 + value.len()
}

pub fn write_string_list(list: &[String], buf: &mut impl BufMut) {
    buf.put_u16(list.len() as u16);
    for s in list {
        write_string(s, buf);
    }
}

pub fn size_of_string_list(list: &[String]) -> usize {
    2 + list.iter().map(|s| size_of_string(s)).sum::<usize>()
}

/// Writes a `[string map]`. Iteration order follows the map; callers that
/// need a deterministic wire image must hand in an ordered map.
pub fn write_string_map(map: &BTreeMap<String, String>, buf: &mut impl BufMut) {
    buf.put_u16(map.len() as u16);
    for (k, v) in map {
        write_string(k, buf);
        write_string(v, buf);
    }
}

pub fn size_of_string_map(map: &BTreeMap<String, String>) -> usize {
    2 + map
        .iter()
        .map(|(k, v)| size_of_string(k) + size_of_string(v))
        .sum::<usize>()
}

pub fn write_bytes_map(map: &BTreeMap<String, Option<Bytes>>, buf: &mut impl BufMut) {
    buf.put_u16(map.len() as u16);
    for (k, v) in map {
        write_string(k, buf);
        write_bytes(v.as_deref(), buf);
    }
}

pub fn size_of_bytes_map(map: &BTreeMap<String, Option<Bytes>>) -> usize {
    2 + map
        .iter()
        .map(|(k, v)| size_of_string(k) + size_of_bytes(v.as_deref()))
        .sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string("hello", &mut buf);
        assert_eq!(buf.len(), size_of_string("hello"));

        let mut reader = buf.freeze();
        assert_eq!(read_string(&mut reader).unwrap(), "hello");
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_long_string_roundtrip() {
        let mut buf = BytesMut::new();
        write_long_string("SELECT * FROM t", &mut buf);
        assert_eq!(buf.len(), size_of_long_string("SELECT * FROM t"));

        let mut reader = buf.freeze();
        assert_eq!(read_long_string(&mut reader).unwrap(), "SELECT * FROM t");
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut buf = BytesMut::new();
        buf.put_u16(2);
        buf.put_slice(&[0xFF, 0xFE]);
        let mut reader = buf.freeze();
        assert!(matches!(
            read_string(&mut reader),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_truncated_string() {
        let mut buf = BytesMut::new();
        buf.put_u16(10);
        buf.put_slice(b"abc");
        let mut reader = buf.freeze();
        assert!(matches!(
            read_string(&mut reader),
            Err(ProtocolError::BodyTooShort { needed: 7 })
        ));
    }

    #[test]
    fn test_uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let mut buf = BytesMut::new();
        write_uuid(&uuid, &mut buf);
        assert_eq!(buf.len(), 16);

        let mut reader = buf.freeze();
        assert_eq!(read_uuid(&mut reader).unwrap(), uuid);
    }

    #[test]
    fn test_bytes_absent_vs_empty() {
        let mut buf = BytesMut::new();
        write_bytes(None, &mut buf);
        write_bytes(Some(&[]), &mut buf);
        assert_eq!(buf.len(), size_of_bytes(None) + size_of_bytes(Some(&[])));

        let mut reader = buf.freeze();
        assert_eq!(read_bytes(&mut reader).unwrap(), None);
        assert_eq!(read_bytes(&mut reader).unwrap(), Some(Bytes::new()));
    }

    #[test]
    fn test_short_bytes_roundtrip() {
        let mut buf = BytesMut::new();
        write_short_bytes(&[1, 2, 3], &mut buf);
        assert_eq!(buf.len(), size_of_short_bytes(&[1, 2, 3]));

        let mut reader = buf.freeze();
        assert_eq!(
            read_short_bytes(&mut reader).unwrap(),
            Bytes::from_static(&[1, 2, 3])
        );
    }

    #[test]
    fn test_string_list_roundtrip() {
        let list = vec!["TOPOLOGY_CHANGE".to_string(), "STATUS_CHANGE".to_string()];
        let mut buf = BytesMut::new();
        write_string_list(&list, &mut buf);
        assert_eq!(buf.len(), size_of_string_list(&list));

        let mut reader = buf.freeze();
        assert_eq!(read_string_list(&mut reader).unwrap(), list);
    }

    #[test]
    fn test_string_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("CQL_VERSION".to_string(), "3.0.0".to_string());
        map.insert("COMPRESSION".to_string(), "lz4".to_string());

        let mut buf = BytesMut::new();
        write_string_map(&map, &mut buf);
        assert_eq!(buf.len(), size_of_string_map(&map));

        let mut reader = buf.freeze();
        let decoded = read_string_map(&mut reader).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded["CQL_VERSION"], "3.0.0");
    }

    #[test]
    fn test_string_multimap_roundtrip() {
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        write_string("CQL_VERSION", &mut buf);
        write_string_list(&["3.0.0".to_string(), "3.4.4".to_string()], &mut buf);

        let mut reader = buf.freeze();
        let decoded = read_string_multimap(&mut reader).unwrap();
        assert_eq!(decoded["CQL_VERSION"], vec!["3.0.0", "3.4.4"]);
    }

    #[test]
    fn test_bytes_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("k1".to_string(), Some(Bytes::from_static(&[1, 2, 3])));
        map.insert("k2".to_string(), Some(Bytes::new()));
        map.insert("k3".to_string(), None);

        let mut buf = BytesMut::new();
        write_bytes_map(&map, &mut buf);
        assert_eq!(buf.len(), size_of_bytes_map(&map));

        let mut reader = buf.freeze();
        let decoded = read_bytes_map(&mut reader).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_read_past_end() {
        let mut reader = Bytes::from_static(&[0x00]);
        assert!(matches!(
            read_unsigned_short(&mut reader),
            Err(ProtocolError::BodyTooShort { needed: 1 })
        ));
    }
}
