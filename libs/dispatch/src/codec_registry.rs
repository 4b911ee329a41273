use std::collections::HashMap;

use switchboard_core::ArgScheme;
use switchboard_fabric::codec::{AnyCodec, BincodeCodec, JsonCodec};

use crate::error::{Error, Result};

/// Codec lookup by argument scheme
///
/// `json` and `thrift` payloads are serialized; `raw` bodies are bytes
/// already and never pass through here.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<ArgScheme, AnyCodec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        let mut codecs = HashMap::new();
        codecs.insert(ArgScheme::Json, AnyCodec::Json(JsonCodec));
        codecs.insert(ArgScheme::Thrift, AnyCodec::Bincode(BincodeCodec));
        Self { codecs }
    }

    /// Replace the codec used for `scheme`
    pub fn with(mut self, scheme: ArgScheme, codec: AnyCodec) -> Self {
        self.codecs.insert(scheme, codec);
        self
    }

    pub fn resolve(&self, scheme: ArgScheme) -> Result<AnyCodec> {
        self.codecs
            .get(&scheme)
            .copied()
            .ok_or(Error::UnsupportedScheme(scheme))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
