//! Value codecs: structured values <-> wire text.

use thiserror::Error;

use crate::convert::{json_to_value, value_to_json};
use crate::Value;

/// Failure inside a [`ValueCodec`].
///
/// Codecs don't know which key they are working on; the mapping layer
/// attaches the key and raw payload when it surfaces this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encode failed: {message}")]
    Encode { message: String },

    #[error("decode failed: {message}")]
    Decode { message: String },
}

/// Codec for converting between Value and the text stored in the backend.
///
/// # Implementing Custom Codecs
///
/// ```rust
/// use kvdict_core::{CodecError, Value, ValueCodec};
///
/// /// Stores every value as its Debug form. Write-only.
/// struct DebugCodec;
///
/// impl ValueCodec for DebugCodec {
///     fn encode(&self, value: &Value) -> Result<String, CodecError> {
///         Ok(format!("{:?}", value))
///     }
///
///     fn decode(&self, _text: &str) -> Result<Value, CodecError> {
///         Err(CodecError::Decode { message: "write-only codec".to_string() })
///     }
/// }
/// ```
pub trait ValueCodec: Send + Sync {
    /// Encode a Value into wire text.
    fn encode(&self, value: &Value) -> Result<String, CodecError>;

    /// Decode wire text into a Value.
    fn decode(&self, text: &str) -> Result<Value, CodecError>;
}

/// The default codec: compact JSON.
///
/// Type normalization: JSON has no fixed-length sequences or non-finite
/// floats, so every sequence decodes as `Value::Array` and NaN / infinity
/// are written as `null`. Integers outside `i64` decode as `Value::Float`.
///
/// # Example
///
/// ```rust
/// use kvdict_core::{JsonCodec, Value, ValueCodec};
///
/// let codec = JsonCodec;
/// let text = codec.encode(&Value::from(vec![1, 2, 3])).unwrap();
/// assert_eq!(text, "[1,2,3]");
/// assert_eq!(codec.decode(&text).unwrap(), Value::from(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        let json = value_to_json(value.clone());
        serde_json::to_string(&json).map_err(|e| CodecError::Encode {
            message: e.to_string(),
        })
    }

    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| CodecError::Decode {
                message: e.to_string(),
            })?;
        Ok(json_to_value(json))
    }
}

type EncodeFn = dyn Fn(&Value) -> Result<String, CodecError> + Send + Sync;
type DecodeFn = dyn Fn(&str) -> Result<Value, CodecError> + Send + Sync;

/// A codec assembled from an encoder function and a decoder function.
///
/// # Example
///
/// ```rust
/// use kvdict_core::{CodecError, FnCodec, JsonCodec, Value, ValueCodec};
///
/// // Pretty-printed JSON on the wire.
/// let codec = FnCodec::new(
///     |value: &Value| {
///         serde_json::to_string_pretty(&kvdict_core::value_to_json(value.clone()))
///             .map_err(|e| CodecError::Encode { message: e.to_string() })
///     },
///     |text: &str| JsonCodec.decode(text),
/// );
///
/// let text = codec.encode(&Value::from(serde_json::json!({"a": 1}))).unwrap();
/// assert!(text.contains('\n'));
/// ```
pub struct FnCodec {
    encoder: Box<EncodeFn>,
    decoder: Box<DecodeFn>,
}

impl FnCodec {
    pub fn new<E, D>(encoder: E, decoder: D) -> Self
    where
        E: Fn(&Value) -> Result<String, CodecError> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        Self {
            encoder: Box::new(encoder),
            decoder: Box::new(decoder),
        }
    }
}

impl ValueCodec for FnCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        (self.encoder)(value)
    }

    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        (self.decoder)(text)
    }
}

impl std::fmt::Debug for FnCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

// Blanket implementation for boxes

impl<T: ValueCodec + ?Sized> ValueCodec for Box<T> {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        self.as_ref().encode(value)
    }

    fn decode(&self, text: &str) -> Result<Value, CodecError> {
        self.as_ref().decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_codec_roundtrip() {
        let codec = JsonCodec;
        let original = Value::from(json!({
            "name": "Alice",
            "age": 30,
            "scores": [1.5, 2.0],
            "nested": {"ok": true, "none": null}
        }));

        let text = codec.encode(&original).unwrap();
        let decoded = codec.decode(&text).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn json_codec_keeps_integral_floats_as_floats() {
        let codec = JsonCodec;
        let text = codec.encode(&Value::Float(2.0)).unwrap();
        assert_eq!(codec.decode(&text).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn json_codec_rejects_garbage() {
        let result = JsonCodec.decode("{not json");
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn fn_codec_uses_closures() {
        let codec = FnCodec::new(
            |value: &Value| Ok(format!("v:{}", value)),
            |text: &str| {
                text.strip_prefix("v:")
                    .ok_or_else(|| CodecError::Decode {
                        message: "missing tag".to_string(),
                    })
                    .and_then(|rest| JsonCodec.decode(rest))
            },
        );

        let text = codec.encode(&Value::from(7)).unwrap();
        assert_eq!(text, "v:7");
        assert_eq!(codec.decode(&text).unwrap(), Value::from(7));
        assert!(codec.decode("7").is_err());
    }

    #[test]
    fn boxed_codec_delegates() {
        let codec: Box<dyn ValueCodec> = Box::new(JsonCodec);
        assert_eq!(codec.encode(&Value::Null).unwrap(), "null");
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::Decode {
            message: "unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "decode failed: unexpected token");
    }
}
