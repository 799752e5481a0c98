//! Custom payload: an optional, version-gated string-to-bytes mapping
//! attached to a request or response for application-defined metadata
//! exchange. The default server-side query handler ignores it.
//!
//! Wire format: 2-byte entry count, then per entry a 2-byte-length-
//! prefixed key string and a 4-byte-length-prefixed value. Legal on the
//! wire only from protocol V4 on.

use crate::error::ProtocolError;
use crate::frame::ProtocolVersion;
use crate::primitive;
use bytes::{Buf, BufMut, Bytes};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// Longest value prefix rendered by the diagnostic formatter.
const MAX_HEX_BYTES: usize = 50;

/// A custom payload map. Keys are unique; encode order is the key order,
/// so the wire image of a given map is deterministic.
///
/// A `None` value models an absent (null) value: representable, and
/// decodable off the wire, but never legal to encode — the encoder
/// rejects it before writing any bytes. `Some` of an empty sequence is a
/// present-but-empty value, distinct from no entry at all.
///
/// A payload handed to the encoder must not be mutated concurrently with
/// encoding; that is a caller obligation, not enforced here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomPayload(BTreeMap<String, Option<Bytes>>);

impl CustomPayload {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts an entry with a present value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.0.insert(key.into(), Some(value.into()));
    }

    /// Inserts an entry with an absent value. Such a payload decodes off
    /// the wire but cannot be re-encoded.
    pub fn insert_null(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), None);
    }

    pub fn get(&self, key: &str) -> Option<&Option<Bytes>> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Option<Bytes>> {
        self.0.iter()
    }

    /// Fails unless the negotiated version supports custom payloads
    /// (V4 and later).
    pub fn check_version(version: ProtocolVersion) -> Result<(), ProtocolError> {
        if version < ProtocolVersion::SUPPORTS_CUSTOM_PAYLOAD {
            return Err(ProtocolError::UnsupportedFeature {
                version,
                feature: "Custom payloads",
            });
        }
        Ok(())
    }

    fn check_no_null_values(&self) -> Result<(), ProtocolError> {
        for (key, value) in &self.0 {
            if value.is_none() {
                return Err(ProtocolError::NullPayloadValue { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Exact serialized length. Fails on a null value, like [`encode`]
    /// (`Self::encode`), so a map that cannot be encoded is never sized.
    pub fn encoded_size(&self) -> Result<usize, ProtocolError> {
        self.check_no_null_values()?;
        Ok(primitive::size_of_bytes_map(&self.0))
    }

    /// Serializes the map. The null-value check runs up front: nothing is
    /// written unless the whole map is encodable.
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        self.check_no_null_values()?;
        primitive::write_bytes_map(&self.0, buf);
        Ok(())
    }

    /// Reads a payload map off the wire. Absent values decode as `None`;
    /// no ordering is imposed beyond count-consistency.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        Ok(Self(primitive::read_bytes_map(buf)?))
    }

    /// Wire size counting absent values as the 4-byte null marker. Used
    /// for diagnostics on the receive path, where null values are legal.
    pub(crate) fn wire_size(&self) -> usize {
        primitive::size_of_bytes_map(&self.0)
    }
}

impl FromIterator<(String, Bytes)> for CustomPayload {
    fn from_iter<I: IntoIterator<Item = (String, Bytes)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k, Some(v)))
                .collect(),
        )
    }
}

/// Diagnostic rendering only, never on the wire: `{k1:0x010203, k2:null}`.
/// Values are uppercase hex, truncated after 50 bytes.
impl fmt::Display for CustomPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{}");
        }
        f.write_char('{')?;
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            f.write_str(key)?;
            f.write_char(':')?;
            match value {
                None => f.write_str("null")?,
                Some(bytes) => write_hex(bytes, f)?,
            }
        }
        f.write_char('}')
    }
}

fn write_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("0x")?;
    for b in bytes.iter().take(MAX_HEX_BYTES) {
        write!(f, "{b:02X}")?;
    }
    if bytes.len() > MAX_HEX_BYTES {
        f.write_str("... [TRUNCATED]")?;
    }
    Ok(())
}

/// Renders an optional payload for diagnostics; an absent map renders as
/// the literal `null`.
pub fn format_payload(payload: Option<&CustomPayload>) -> String {
    match payload {
        None => "null".to_string(),
        Some(p) => p.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use proptest::prelude::*;

    fn payload(entries: &[(&str, &[u8])]) -> CustomPayload {
        let mut p = CustomPayload::new();
        for (k, v) in entries {
            p.insert(*k, v.to_vec());
        }
        p
    }

    #[test]
    fn test_roundtrip() {
        let p = payload(&[("k1", &[1, 2, 3]), ("k2", &[4, 5, 6]), ("empty", &[])]);

        let mut buf = BytesMut::new();
        p.encode(&mut buf).unwrap();

        let mut reader = buf.freeze();
        let decoded = CustomPayload::decode(&mut reader).unwrap();
        assert_eq!(decoded, p);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_empty_map_roundtrip() {
        let p = CustomPayload::new();
        let mut buf = BytesMut::new();
        p.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 2);

        let decoded = CustomPayload::decode(&mut buf.freeze()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_size_agreement() {
        let p = payload(&[("a", &[0xFF; 17]), ("bb", &[]), ("ccc", &[1])]);
        let mut buf = BytesMut::new();
        p.encode(&mut buf).unwrap();
        assert_eq!(p.encoded_size().unwrap(), buf.len());
    }

    #[test]
    fn test_null_value_rejected_before_write() {
        let mut p = payload(&[("good", &[1])]);
        p.insert_null("bad");

        let mut buf = BytesMut::new();
        let result = p.encode(&mut buf);
        assert!(matches!(
            result,
            Err(ProtocolError::NullPayloadValue { ref key }) if key == "bad"
        ));
        assert!(buf.is_empty());
        assert!(p.encoded_size().is_err());
    }

    #[test]
    fn test_null_value_decodes() {
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        crate::primitive::write_string("k", &mut buf);
        buf.put_i32(-1);

        let decoded = CustomPayload::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.get("k"), Some(&None));
    }

    #[test]
    fn test_version_gate() {
        assert!(CustomPayload::check_version(ProtocolVersion::V4).is_ok());
        assert!(CustomPayload::check_version(ProtocolVersion::V5).is_ok());
        let result = CustomPayload::check_version(ProtocolVersion::V3);
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedFeature {
                version: ProtocolVersion::V3,
                ..
            })
        ));
    }

    #[test]
    fn test_display() {
        let p = payload(&[("k1", &[1, 2, 3]), ("k2", &[4, 5, 6])]);
        assert_eq!(p.to_string(), "{k1:0x010203, k2:0x040506}");

        assert_eq!(CustomPayload::new().to_string(), "{}");
        assert_eq!(format_payload(None), "null");

        let mut p = CustomPayload::new();
        p.insert_null("k");
        assert_eq!(p.to_string(), "{k:null}");
    }

    #[test]
    fn test_display_truncation() {
        let p = payload(&[("k", &[0xAB; 51])]);
        let rendered = p.to_string();
        assert_eq!(
            rendered,
            format!("{{k:0x{}... [TRUNCATED]}}", "AB".repeat(50))
        );

        let p = payload(&[("k", &[0xAB; 50])]);
        let rendered = p.to_string();
        assert!(!rendered.contains("TRUNCATED"));
        assert!(rendered.ends_with(&format!("0x{}}}", "AB".repeat(50))));
    }

    proptest! {
        #[test]
        fn prop_roundtrip_and_size(entries in proptest::collection::btree_map(
            "[a-z]{1,8}",
            proptest::collection::vec(any::<u8>(), 0..64),
            0..8,
        )) {
            let p: CustomPayload = entries
                .into_iter()
                .map(|(k, v)| (k, Bytes::from(v)))
                .collect();

            let mut buf = BytesMut::new();
            p.encode(&mut buf).unwrap();
            prop_assert_eq!(p.encoded_size().unwrap(), buf.len());

            let decoded = CustomPayload::decode(&mut buf.freeze()).unwrap();
            prop_assert_eq!(decoded, p);
        }
    }
}
