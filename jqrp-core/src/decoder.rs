//! Strict single-root JSON decoding.
//!
//! Upstream bodies must hold exactly one JSON document whose root is an
//! array or an object. The root shape is kept alongside the value because
//! it decides the body written back when a query yields nothing.

use serde_json::{Deserializer, Value};

use crate::error::DecodeError;

/// The two legal root shapes of an upstream document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootShape {
    Array,
    Object,
}

impl RootShape {
    /// Classify `value`; `None` for primitives.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Array(_) => Some(RootShape::Array),
            Value::Object(_) => Some(RootShape::Object),
            _ => None,
        }
    }

    /// Body written when a query over a document of this shape yields nothing.
    pub fn empty_body(&self) -> &'static [u8] {
        match self {
            RootShape::Array => b"[]",
            RootShape::Object => b"{}",
        }
    }
}

/// A decoded document together with its root shape.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRoot {
    pub shape: RootShape,
    pub value: Value,
}

impl JsonRoot {
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Decode exactly one array- or object-rooted JSON document from `bytes`.
///
/// Leading and trailing JSON whitespace is allowed. Anything else after the
/// first document is [`DecodeError::MultipleRoots`]. A primitive root is
/// rejected before trailing content is looked at.
pub fn decode_single_root(bytes: &[u8]) -> Result<JsonRoot, DecodeError> {
    let mut stream = Deserializer::from_slice(bytes).into_iter::<Value>();

    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            return Err(DecodeError::Malformed {
                reason: err.to_string(),
            })
        }
        None => {
            return Err(DecodeError::Malformed {
                reason: "EOF while parsing a value".to_string(),
            })
        }
    };

    let shape = RootShape::of(&value).ok_or(DecodeError::PrimitiveRoot)?;

    let rest = &bytes[stream.byte_offset()..];
    if rest.iter().any(|b| !is_json_whitespace(*b)) {
        return Err(DecodeError::MultipleRoots);
    }

    Ok(JsonRoot { shape, value })
}

fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_object() {
        let root = decode_single_root(br#"{"valid": "json"}"#).unwrap();
        assert_eq!(root.shape, RootShape::Object);
        assert_eq!(root.value, json!({"valid": "json"}));
    }

    #[test]
    fn test_valid_array_with_surrounding_whitespace() {
        let root = decode_single_root(b"\n  [1, 2]\r\n\t ").unwrap();
        assert_eq!(root.shape, RootShape::Array);
        assert_eq!(root.into_value(), json!([1, 2]));
    }

    #[test]
    fn test_malformed() {
        let err = decode_single_root(br#"{"invalid: json"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_empty_body_is_malformed() {
        assert!(matches!(
            decode_single_root(b""),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decode_single_root(b"   \n"),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_multiple_roots() {
        assert_eq!(
            decode_single_root(br#"{"valid": "json"}[1, 2]"#),
            Err(DecodeError::MultipleRoots)
        );
        assert_eq!(
            decode_single_root(b"[1] [2]"),
            Err(DecodeError::MultipleRoots)
        );
    }

    #[test]
    fn test_trailing_garbage_is_multiple_roots() {
        assert_eq!(
            decode_single_root(b"{} garbage"),
            Err(DecodeError::MultipleRoots)
        );
        assert_eq!(decode_single_root(b"[]]"), Err(DecodeError::MultipleRoots));
    }

    #[test]
    fn test_primitive_roots() {
        for input in [&b"\"foobar\""[..], b"42", b"true", b"null", b"-1.5e3"] {
            assert_eq!(decode_single_root(input), Err(DecodeError::PrimitiveRoot));
        }
    }

    #[test]
    fn test_primitive_root_checked_before_trailing_content() {
        assert_eq!(
            decode_single_root(br#""foo" [1]"#),
            Err(DecodeError::PrimitiveRoot)
        );
    }

    #[test]
    fn test_empty_bodies_per_shape() {
        assert_eq!(RootShape::Array.empty_body(), b"[]");
        assert_eq!(RootShape::Object.empty_body(), b"{}");
    }
}
