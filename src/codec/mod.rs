//! Codec module - value serialization per content type.
//!
//! The bridge never serializes anything itself; channels and the async
//! manager pick a codec from the [`ContentType`] hint they are given:
//!
//! - [`ContentType::MsgPack`] - [`MsgPackCodec`] (struct-as-map, the default)
//! - [`ContentType::Json`] - [`JsonCodec`]
//! - [`ContentType::Text`] - [`TextCodec`] (strings verbatim, other values as JSON)
//!
//! # Example
//!
//! ```
//! use reactive_bridge::codec::{encode, ContentType};
//!
//! let text = encode(ContentType::Text, &"single value").unwrap();
//! assert_eq!(&text[..], b"single value");
//!
//! let json = encode(ContentType::Json, &"single value").unwrap();
//! assert_eq!(&json[..], b"\"single value\"");
//! ```

mod json;
mod msgpack;

use bytes::Bytes;
use serde::Serialize;

use crate::error::Result;

pub use json::{JsonCodec, TextCodec};
pub use msgpack::MsgPackCodec;

/// Content type hint for serializing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// MessagePack, structs as maps.
    #[default]
    MsgPack,
    /// JSON.
    Json,
    /// Plain text.
    Text,
}

impl ContentType {
    /// MIME type string.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::MsgPack => "application/msgpack",
            Self::Json => "application/json",
            Self::Text => "text/plain",
        }
    }

    /// Whether values encoded with this type are UTF-8 text.
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::MsgPack)
    }
}

/// Encode a value with the codec selected by `content_type`.
pub fn encode<T: Serialize + ?Sized>(content_type: ContentType, value: &T) -> Result<Bytes> {
    let bytes = match content_type {
        ContentType::MsgPack => MsgPackCodec::encode(value)?,
        ContentType::Json => JsonCodec::encode(value)?,
        ContentType::Text => TextCodec::encode(value)?.into_bytes(),
    };
    Ok(Bytes::from(bytes))
}
