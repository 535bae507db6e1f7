//! Binary envelope codec (MessagePack)
//!
//! Envelopes are written with `rmp_serde`, matching what Socket.IO adapters
//! on the other side of the bus expect: integers and integral floats use
//! their smallest encoding, and structs can be written either positionally
//! or as maps keyed by their serde (wire) field names.
//!
//! Output buffers are pooled. A buffer is cleared before it goes back to the
//! pool, so the next caller always starts from an empty buffer.

use crate::error::{EmitterError, Result};
use bytes::Bytes;
use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Buffers larger than this are dropped instead of pooled
const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// Initial capacity for freshly allocated buffers
const INITIAL_CAPACITY: usize = 256;

/// Default number of idle buffers kept by a codec
const DEFAULT_MAX_IDLE: usize = 32;

/// How struct field names are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNames {
    /// Structs are written as arrays in field order
    Native,
    /// Structs are written as maps keyed by their serde names (`#[serde(rename)]`)
    Compatible,
}

/// Pooled MessagePack encoder
pub struct Codec {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }
}

impl Codec {
    /// Create a codec that keeps at most `max_idle` buffers between calls
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Process-wide codec shared by all emitters
    pub fn global() -> &'static Codec {
        static GLOBAL: OnceLock<Codec> = OnceLock::new();
        GLOBAL.get_or_init(Codec::default)
    }

    /// Serialize `value` into a standalone byte buffer
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T, names: FieldNames) -> Result<Bytes> {
        let mut buf = self.acquire();

        match names {
            FieldNames::Compatible => {
                let mut ser = rmp_serde::Serializer::new(&mut buf.buf).with_struct_map();
                value.serialize(&mut ser)?;
            }
            FieldNames::Native => {
                let mut ser = rmp_serde::Serializer::new(&mut buf.buf);
                value.serialize(&mut ser)?;
            }
        }

        Ok(Bytes::copy_from_slice(&buf.buf))
    }

    /// Convert any serializable value into a value tree, keeping serde field names
    ///
    /// Structs become maps keyed by their serde names and byte fields
    /// become `Value::Binary`.
    pub fn to_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        let mut buf = self.acquire();
        {
            let mut ser = rmp_serde::Serializer::new(&mut buf.buf).with_struct_map();
            value.serialize(&mut ser)?;
        }
        decode_value(&buf.buf)
    }

    /// Deserialize a typed value from envelope bytes
    ///
    /// Not pooled: the deserializer borrows the input slice and holds no
    /// reusable state.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Number of idle buffers currently pooled
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY));
        PooledBuffer { buf, codec: self }
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A buffer checked out of a codec, returned on drop
struct PooledBuffer<'a> {
    buf: Vec<u8>,
    codec: &'a Codec,
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.codec.release(buf);
    }
}

/// Decode envelope bytes into a dynamic value tree
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let mut cursor = bytes;
    rmpv::decode::read_value(&mut cursor).map_err(|e| EmitterError::Decoding(e.to_string()))
}

/// Serializes a dynamic value with integral floats collapsed to integers
pub struct CompactValue<'a>(pub &'a Value);

impl Serialize for CompactValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::F64(f) => match integral(*f) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*f),
            },
            Value::F32(f) => match integral(f64::from(*f)) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f32(*f),
            },
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&CompactValue(item))?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&CompactValue(k), &CompactValue(v))?;
                }
                map.end()
            }
            other => other.serialize(serializer),
        }
    }
}

/// Serializes a slice of dynamic values through `CompactValue`
pub(crate) fn serialize_compact_seq<S: Serializer>(
    values: &[Value],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        seq.serialize_element(&CompactValue(value))?;
    }
    seq.end()
}

fn integral(f: f64) -> Option<i64> {
    // NaN and infinities fail `fract() == 0.0`
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Convert a JSON value into a MessagePack value tree
pub fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::from(u)
            } else if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::String(s.into()),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (Value::String(k.into()), from_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Probe {
        #[serde(rename = "nsp")]
        namespace: String,
        count: u32,
    }

    struct Unrepresentable;

    impl Serialize for Unrepresentable {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no binary form"))
        }
    }

    #[test]
    fn test_compatible_names_use_serde_rename() {
        let codec = Codec::default();
        let probe = Probe { namespace: "/chat".to_string(), count: 3 };

        let bytes = codec.encode(&probe, FieldNames::Compatible).unwrap();
        let value = decode_value(&bytes).unwrap();
        let entries = value.as_map().unwrap();

        assert_eq!(entries[0].0.as_str(), Some("nsp"));
        assert_eq!(entries[0].1.as_str(), Some("/chat"));
        assert_eq!(entries[1].0.as_str(), Some("count"));
    }

    #[test]
    fn test_native_names_are_positional() {
        let codec = Codec::default();
        let probe = Probe { namespace: "/".to_string(), count: 1 };

        let bytes = codec.encode(&probe, FieldNames::Native).unwrap();
        let value = decode_value(&bytes).unwrap();
        let items = value.as_array().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_str(), Some("/"));
        assert_eq!(items[1].as_u64(), Some(1));
    }

    #[test]
    fn test_typed_decode_roundtrip() {
        let codec = Codec::default();
        let probe = Probe { namespace: "/admin".to_string(), count: 7 };

        let bytes = codec.encode(&probe, FieldNames::Compatible).unwrap();
        let parsed: Probe = codec.decode(&bytes).unwrap();
        assert_eq!(parsed, probe);
    }

    #[test]
    fn test_to_value_uses_serde_names() {
        let codec = Codec::default();
        let probe = Probe { namespace: "/chat".to_string(), count: 2 };

        let value = codec.to_value(&probe).unwrap();
        let entries = value.as_map().unwrap();
        assert_eq!(entries[0].0.as_str(), Some("nsp"));
        assert_eq!(entries[1].1.as_u64(), Some(2));
        assert_eq!(codec.idle(), 1);
    }

    #[test]
    fn test_to_value_rejects_unrepresentable() {
        let codec = Codec::default();
        let err = codec.to_value(&Unrepresentable).unwrap_err();
        assert!(matches!(err, EmitterError::Encoding(_)));
    }

    #[test]
    fn test_integers_use_smallest_encoding() {
        let codec = Codec::default();
        assert_eq!(codec.encode(&1u64, FieldNames::Compatible).unwrap().as_ref(), &[0x01]);
        assert_eq!(codec.encode(&-1i64, FieldNames::Compatible).unwrap().as_ref(), &[0xff]);
        assert_eq!(
            codec.encode(&300i64, FieldNames::Compatible).unwrap().as_ref(),
            &[0xcd, 0x01, 0x2c]
        );
    }

    #[test]
    fn test_integral_floats_collapse_to_integers() {
        let codec = Codec::default();
        let value = Value::F64(3.0);
        let bytes = codec.encode(&CompactValue(&value), FieldNames::Compatible).unwrap();
        assert_eq!(bytes.as_ref(), &[0x03]);

        let nested = Value::Array(vec![Value::F64(-2.0), Value::F32(4.0)]);
        let bytes = codec.encode(&CompactValue(&nested), FieldNames::Compatible).unwrap();
        assert_eq!(bytes.as_ref(), &[0x92, 0xfe, 0x04]);
    }

    #[test]
    fn test_fractional_floats_stay_floats() {
        let codec = Codec::default();
        let value = Value::F64(3.5);
        let bytes = codec.encode(&CompactValue(&value), FieldNames::Compatible).unwrap();
        assert_eq!(bytes[0], 0xcb);
        assert_eq!(bytes.len(), 9);

        let nan = Value::F64(f64::NAN);
        let bytes = codec.encode(&CompactValue(&nan), FieldNames::Compatible).unwrap();
        assert_eq!(bytes[0], 0xcb);
    }

    #[test]
    fn test_binary_values_encode_as_bin() {
        let codec = Codec::default();
        let value = Value::Binary(vec![0xde, 0xad]);
        let bytes = codec.encode(&CompactValue(&value), FieldNames::Compatible).unwrap();
        assert_eq!(bytes.as_ref(), &[0xc4, 0x02, 0xde, 0xad]);
    }

    #[test]
    fn test_unrepresentable_value_is_encoding_error() {
        let codec = Codec::default();
        let err = codec.encode(&Unrepresentable, FieldNames::Compatible).unwrap_err();
        assert!(matches!(err, EmitterError::Encoding(_)));
        // The buffer still goes back to the pool
        assert_eq!(codec.idle(), 1);
    }

    #[test]
    fn test_pooled_buffer_never_carries_state() {
        let codec = Codec::with_max_idle(1);
        let long = "x".repeat(100);
        codec.encode(&long, FieldNames::Compatible).unwrap();
        assert_eq!(codec.idle(), 1);

        let bytes = codec.encode(&true, FieldNames::Native).unwrap();
        assert_eq!(bytes.as_ref(), &[0xc3]);
        assert_eq!(codec.idle(), 1);
    }

    #[test]
    fn test_oversized_buffers_are_not_retained() {
        let codec = Codec::default();
        let big = vec![0u8; MAX_RETAINED_CAPACITY * 2];
        codec.encode(&Value::Binary(big), FieldNames::Compatible).unwrap();
        assert_eq!(codec.idle(), 0);
    }

    #[test]
    fn test_from_json() {
        let value = from_json(serde_json::json!({
            "rate": 7.35,
            "count": 3,
            "neg": -4,
            "tags": ["a", null, true],
        }));

        let map = value.as_map().unwrap();
        let get = |key: &str| {
            map.iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("rate").as_f64(), Some(7.35));
        assert_eq!(get("count").as_u64(), Some(3));
        assert_eq!(get("neg").as_i64(), Some(-4));
        let tags = get("tags");
        let tags = tags.as_array().unwrap();
        assert_eq!(tags[0].as_str(), Some("a"));
        assert!(tags[1].is_nil());
        assert_eq!(tags[2].as_bool(), Some(true));
    }

    #[test]
    fn test_decode_value_rejects_truncated_input() {
        let err = decode_value(&[0x92, 0x01]).unwrap_err();
        assert!(matches!(err, EmitterError::Decoding(_)));
    }
}
