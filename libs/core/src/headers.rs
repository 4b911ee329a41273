use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// String-keyed headers attached to every request and response
pub type TransportHeaders = HashMap<String, String>;

/// Well-known transport header keys
pub mod keys {
    /// Argument scheme of the payload (`raw`, `json`, `thrift`)
    pub const ARG_SCHEME: &str = "as";
    /// Service name of the caller
    pub const CALLER_NAME: &str = "cn";
    pub const RETRY_FLAGS: &str = "re";
    pub const SPECULATIVE_EXECUTION: &str = "se";
    pub const FAILURE_DOMAIN: &str = "fd";
    pub const SHARD_KEY: &str = "sk";
    pub const ROUTING_DELEGATE: &str = "rd";
}

/// Serialization scheme of a call's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgScheme {
    Raw,
    Json,
    Thrift,
}

impl ArgScheme {
    /// Tag used in the `as` transport header
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgScheme::Raw => "raw",
            ArgScheme::Json => "json",
            ArgScheme::Thrift => "thrift",
        }
    }

    /// Read the scheme out of a header map, if present
    pub fn from_headers(headers: &TransportHeaders) -> Option<Result<Self, Error>> {
        headers.get(keys::ARG_SCHEME).map(|tag| tag.parse())
    }
}

impl fmt::Display for ArgScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArgScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ArgScheme::Raw),
            "json" => Ok(ArgScheme::Json),
            "thrift" => Ok(ArgScheme::Thrift),
            other => Err(Error::UnknownArgScheme(other.to_string())),
        }
    }
}
