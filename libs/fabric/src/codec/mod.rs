use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

pub mod bincode;
pub mod json;

pub use self::bincode::BincodeCodec;
pub use self::json::JsonCodec;

/// Codec trait for serializing and deserializing messages
pub trait Codec: Send + Sync {
    /// Encode a value into bytes
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes into a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// One of the schemed payload codecs
///
/// `Codec` is generic over the value type and cannot be boxed, so codec
/// lookups by scheme hand out this enum instead.
#[derive(Debug, Clone, Copy)]
pub enum AnyCodec {
    Json(JsonCodec),
    Bincode(BincodeCodec),
}

impl Codec for AnyCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            AnyCodec::Json(codec) => codec.encode(value),
            AnyCodec::Bincode(codec) => codec.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            AnyCodec::Json(codec) => codec.decode(bytes),
            AnyCodec::Bincode(codec) => codec.decode(bytes),
        }
    }
}
