//! JSON and plain-text codecs using `serde_json`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// JSON codec.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    #[inline]
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Text codec.
///
/// String values are written verbatim (no quotes); anything else falls back
/// to its compact JSON rendering.
pub struct TextCodec;

impl TextCodec {
    /// Render a value as text.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        match serde_json::to_value(value)? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}
